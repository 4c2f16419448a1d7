//! Lifecycle event types and the handlers the worker registers for them.
//!
//! A registered domain completes its order: the handler publishes an
//! [`OrderStatusUpdate`] for the order that requested the domain. Status
//! updates and issued certificates are recorded in the log.

use anyhow::Context;
use chrono::{DateTime, Utc};
use lifecycle_queue::{
    DispatchContext, HandlerError, HandlerRegistry, Publisher, QueueMessage, SendOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Header naming the service that produced a message
pub const SOURCE_HEADER: &str = "source";

/// Value of [`SOURCE_HEADER`] on messages this worker publishes
pub const SOURCE: &str = "lifecycle-worker";

/// A domain finished registration at the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRegistered {
    pub domain: String,
    pub order_id: String,
}

impl QueueMessage for DomainRegistered {
    fn group_key(&self) -> Option<String> {
        Some(self.domain.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An order moved to a new status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub id: String,
    pub status: OrderStatus,
}

impl QueueMessage for OrderStatusUpdate {
    fn group_key(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

/// A TLS certificate was issued for a hosted domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIssued {
    pub domain: String,
    pub serial: String,
    pub not_after: DateTime<Utc>,
}

impl QueueMessage for CertificateIssued {
    fn group_key(&self) -> Option<String> {
        Some(self.domain.clone())
    }
}

/// Build the registry of every lifecycle handler.
///
/// `publisher` is used by handlers that emit follow-up events.
pub fn registry(publisher: Publisher) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register_fn(move |ctx: DispatchContext, event: DomainRegistered| {
            let publisher = publisher.clone();
            async move { complete_order(&publisher, &ctx, event).await }
        })
        .register_fn(|ctx: DispatchContext, update: OrderStatusUpdate| async move {
            record_status(&ctx, &update);
            Ok::<(), HandlerError>(())
        })
        .register_fn(|ctx: DispatchContext, issued: CertificateIssued| async move {
            record_certificate(&ctx, &issued);
            Ok::<(), HandlerError>(())
        });
    registry
}

async fn complete_order(
    publisher: &Publisher,
    ctx: &DispatchContext,
    event: DomainRegistered,
) -> Result<(), HandlerError> {
    info!(
        domain = %event.domain,
        order_id = %event.order_id,
        receive_count = ctx.receive_count(),
        "Domain registered"
    );

    let update = OrderStatusUpdate {
        id: event.order_id,
        status: OrderStatus::Completed,
    };
    let options = SendOptions::new().with_header(SOURCE_HEADER, SOURCE);

    let message_id = publisher
        .send_with(&update, options)
        .await
        .with_context(|| format!("failed to publish completion of order {}", update.id))?;

    info!(order_id = %update.id, message_id = %message_id, "Order completed");
    Ok(())
}

fn record_status(ctx: &DispatchContext, update: &OrderStatusUpdate) {
    let source = ctx
        .header(SOURCE_HEADER)
        .and_then(|value| value.as_str())
        .unwrap_or("unknown");

    info!(
        order_id = %update.id,
        status = ?update.status,
        source,
        "Order status updated"
    );
}

fn record_certificate(ctx: &DispatchContext, issued: &CertificateIssued) {
    let remaining = issued.not_after - Utc::now();
    if remaining <= chrono::Duration::zero() {
        warn!(
            domain = %issued.domain,
            serial = %issued.serial,
            not_after = %issued.not_after,
            receive_count = ctx.receive_count(),
            "Issued certificate has already expired"
        );
        return;
    }

    info!(
        domain = %issued.domain,
        serial = %issued.serial,
        not_after = %issued.not_after,
        days_remaining = remaining.num_days(),
        "Certificate issued"
    );
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
