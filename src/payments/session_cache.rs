//! Process-local payment session cache.
//!
//! This is a read-through cache in front of the provider's status API,
//! not a durable store: a restart empties it and the next status check
//! falls through to the provider. One instance is shared via `Arc` in
//! `AppState`; the `RwLock` is the only coordination it needs.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::models::{PaymentSession, SessionStatus};

#[derive(Default)]
pub struct SessionCache {
    inner: RwLock<HashMap<String, PaymentSession>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: PaymentSession) {
        let mut map = self.inner.write().expect("session cache lock poisoned");
        map.insert(session.session_id.clone(), session);
    }

    pub fn get(&self, session_id: &str) -> Option<PaymentSession> {
        let map = self.inner.read().expect("session cache lock poisoned");
        map.get(session_id).cloned()
    }

    /// Update a cached session in place. Returns false on cache miss.
    pub fn set_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        paid_at: Option<i64>,
    ) -> bool {
        let mut map = self.inner.write().expect("session cache lock poisoned");
        match map.get_mut(session_id) {
            Some(session) => {
                session.status = status;
                if paid_at.is_some() {
                    session.paid_at = paid_at;
                } else if status == SessionStatus::Paid && session.paid_at.is_none() {
                    session.paid_at = Some(Utc::now().timestamp());
                }
                session.updated_at = Utc::now().timestamp();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<PaymentSession> {
        let mut map = self.inner.write().expect("session cache lock poisoned");
        map.remove(session_id)
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read().expect("session cache lock poisoned");
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a fresh pending session snapshot.
pub fn new_session(
    session_id: &str,
    order_number: &str,
    product_id: &str,
    amount_cents: i64,
    currency: &str,
    customer_email: &str,
) -> PaymentSession {
    let now = Utc::now().timestamp();
    PaymentSession {
        session_id: session_id.to_string(),
        order_id: order_number.to_string(),
        product_id: product_id.to_string(),
        amount_cents,
        currency: currency.to_string(),
        status: SessionStatus::Pending,
        customer_email: customer_email.to_string(),
        paid_at: None,
        created_at: now,
        updated_at: now,
    }
}
