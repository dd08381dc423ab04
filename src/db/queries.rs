use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::keygen;
use crate::models::*;

use super::from_row::{
    query_all, query_one, COUPON_COLS, LICENSE_COLS, ORDER_COLS, OUTBOUND_EMAIL_COLS, PRODUCT_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    input.validate()?;

    let id = EntityType::Product.gen_id();
    let now = now();
    let slug = input.slug.trim().to_lowercase();

    conn.execute(
        "INSERT INTO products (id, slug, name, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![&id, &slug, input.name.trim(), now],
    )?;

    Ok(Product {
        id,
        slug,
        name: input.name.trim().to_string(),
        active: true,
        created_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn get_product_by_slug(conn: &Connection, slug: &str) -> Result<Option<Product>> {
    let slug = slug.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE slug = ?1", PRODUCT_COLS),
        &[&slug],
    )
}

pub fn list_products(conn: &Connection) -> Result<Vec<Product>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM products ORDER BY created_at DESC",
            PRODUCT_COLS
        ),
        &[],
    )
}

// ============ Orders ============

/// Create a pending order. The order number is generated here; the unique
/// constraint turns the (negligible) collision case into an error rather
/// than a silent overwrite.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let id = EntityType::Order.gen_id();
    let order_number = keygen::generate_order_number();
    let now = now();
    let email = input.customer_email.trim().to_lowercase();
    let total_cents = input.amount_cents - input.discount_cents;

    conn.execute(
        "INSERT INTO orders (id, order_number, customer_email, product_id, product_name, duration, amount_cents, discount_cents, total_cents, coupon_code, status, payment_method, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?12, ?12)",
        params![
            &id,
            &order_number,
            &email,
            &input.product_id,
            &input.product_name,
            &input.duration,
            input.amount_cents,
            input.discount_cents,
            total_cents,
            &input.coupon_code,
            &input.payment_method,
            now
        ],
    )?;

    Ok(Order {
        id,
        order_number,
        customer_email: email,
        product_id: input.product_id.clone(),
        product_name: input.product_name.clone(),
        duration: input.duration.clone(),
        amount_cents: input.amount_cents,
        discount_cents: input.discount_cents,
        total_cents,
        coupon_code: input.coupon_code.clone(),
        status: OrderStatus::Pending,
        payment_method: input.payment_method.clone(),
        payment_session_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_order_by_number(conn: &Connection, order_number: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_number = ?1", ORDER_COLS),
        &[&order_number],
    )
}

pub fn get_order_by_session(conn: &Connection, session_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE payment_session_id = ?1",
            ORDER_COLS
        ),
        &[&session_id],
    )
}

pub fn list_orders(conn: &Connection, status: Option<OrderStatus>) -> Result<Vec<Order>> {
    match status {
        Some(status) => query_all(
            conn,
            &format!(
                "SELECT {} FROM orders WHERE status = ?1 ORDER BY created_at DESC",
                ORDER_COLS
            ),
            &[&status.as_str()],
        ),
        None => query_all(
            conn,
            &format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLS),
            &[],
        ),
    }
}

/// Attach the provider session paying for an order.
pub fn set_order_session(
    conn: &Connection,
    order_id: &str,
    session_id: &str,
    payment_method: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE orders SET payment_session_id = ?1, payment_method = COALESCE(?2, payment_method), updated_at = ?3 WHERE id = ?4",
        params![session_id, payment_method, now(), order_id],
    )?;
    Ok(())
}

/// Compare-and-swap status transition. Returns false when the row is no
/// longer in `from` (lost race or stale webhook), which callers treat as
/// "already processed" rather than an error.
///
/// The transition table is checked first so an illegal pair is a bug
/// surfaced early, not a silent no-op.
pub fn transition_order(
    conn: &Connection,
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool> {
    if !from.can_transition_to(to) {
        return Err(AppError::BadRequest(format!(
            "illegal order transition: {} -> {}",
            from, to
        )));
    }

    let affected = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now(), order_id, from.as_str()],
    )?;
    Ok(affected > 0)
}

/// Record how a completed order was paid (from the webhook payload).
pub fn set_order_payment_method(
    conn: &Connection,
    order_id: &str,
    payment_method: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE orders SET payment_method = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_method, now(), order_id],
    )?;
    Ok(())
}

/// Compensating delete for the failed session-creation path. The only
/// place orders are ever deleted.
pub fn delete_pending_order(conn: &Connection, order_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM orders WHERE id = ?1 AND status = 'pending'",
        params![order_id],
    )?;
    Ok(affected > 0)
}

pub fn order_stats(conn: &Connection) -> Result<OrderStats> {
    conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(status = 'pending'), 0),
            COALESCE(SUM(status = 'completed'), 0),
            COALESCE(SUM(status = 'failed'), 0),
            COALESCE(SUM(status = 'refunded'), 0),
            COALESCE(SUM(status = 'expired'), 0),
            COALESCE(SUM(status = 'cancelled'), 0),
            COALESCE(SUM(CASE WHEN status = 'completed' THEN total_cents ELSE 0 END), 0)
         FROM orders",
        [],
        |row| {
            Ok(OrderStats {
                total: row.get(0)?,
                in_progress: row.get(1)?,
                completed: row.get(2)?,
                failed: row.get(3)?,
                refunded: row.get(4)?,
                expired: row.get(5)?,
                cancelled: row.get(6)?,
                revenue_cents: row.get(7)?,
            })
        },
    )
    .map_err(Into::into)
}

// ============ Licenses ============

/// Create the license for a (customer, product) pair, or return the
/// existing one. The unique index makes this safe under concurrent
/// webhook delivery: both writers race on the same index entry and the
/// loser's insert is a no-op.
///
/// Returns the license and whether it was created by this call.
pub fn find_or_create_license(
    conn: &Connection,
    license_key: &str,
    input: &CreateLicense,
) -> Result<(License, bool)> {
    let id = EntityType::License.gen_id();
    let now = now();
    let email = input.customer_email.trim().to_lowercase();

    let inserted = conn.execute(
        "INSERT INTO licenses (id, license_key, product_id, product_name, customer_email, duration, status, expires_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(customer_email, product_id) DO NOTHING",
        params![
            &id,
            license_key,
            &input.product_id,
            &input.product_name,
            &email,
            &input.duration,
            input.status.as_str(),
            input.expires_at,
            now
        ],
    )?;

    let license = get_license_for_customer(conn, &email, &input.product_id)?.ok_or_else(|| {
        AppError::Internal("license row missing after upsert".into())
    })?;

    Ok((license, inserted > 0))
}

pub fn get_license_for_customer(
    conn: &Connection,
    customer_email: &str,
    product_id: &str,
) -> Result<Option<License>> {
    let email = customer_email.trim().to_lowercase();
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE customer_email = ?1 AND product_id = ?2",
            LICENSE_COLS
        ),
        &[&email, &product_id],
    )
}

pub fn get_license_by_key(conn: &Connection, license_key: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_key = ?1", LICENSE_COLS),
        &[&license_key],
    )
}

pub fn list_licenses(conn: &Connection) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses ORDER BY created_at DESC",
            LICENSE_COLS
        ),
        &[],
    )
}

pub fn revoke_license(conn: &Connection, license_key: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET status = 'revoked', updated_at = ?1 WHERE license_key = ?2 AND status != 'revoked'",
        params![now(), license_key],
    )?;
    Ok(affected > 0)
}

/// Age out active licenses whose expiry has passed. Run by the
/// background maintenance task.
pub fn mark_expired_licenses(conn: &Connection) -> Result<usize> {
    let now = now();
    let affected = conn.execute(
        "UPDATE licenses SET status = 'expired', updated_at = ?1 WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1",
        params![now],
    )?;
    Ok(affected)
}

// ============ Coupons ============

pub fn create_coupon(conn: &Connection, input: &CreateCoupon) -> Result<Coupon> {
    input.validate()?;

    let id = EntityType::Coupon.gen_id();
    let now = now();
    let code = input.code.trim().to_uppercase();

    conn.execute(
        "INSERT INTO coupons (id, code, discount_percent, max_uses, current_uses, is_active, valid_until, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?6)",
        params![&id, &code, input.discount_percent, input.max_uses, input.valid_until, now],
    )?;

    Ok(Coupon {
        id,
        code,
        discount_percent: input.discount_percent,
        max_uses: input.max_uses,
        current_uses: 0,
        is_active: true,
        valid_until: input.valid_until,
        created_at: now,
    })
}

pub fn get_coupon_by_code(conn: &Connection, code: &str) -> Result<Option<Coupon>> {
    let code = code.trim();
    query_one(
        conn,
        &format!(
            "SELECT {} FROM coupons WHERE code = ?1 COLLATE NOCASE",
            COUPON_COLS
        ),
        &[&code],
    )
}

pub fn list_coupons(conn: &Connection) -> Result<Vec<Coupon>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM coupons ORDER BY created_at DESC",
            COUPON_COLS
        ),
        &[],
    )
}

/// Read-only validation: reports whether a code would be accepted and at
/// what discount. A product ID is deliberately not a parameter;
/// per-product restrictions do not exist in this shop.
pub fn validate_coupon(conn: &Connection, code: &str) -> Result<CouponValidation> {
    let Some(coupon) = get_coupon_by_code(conn, code)? else {
        return Ok(CouponValidation::rejected("unknown coupon code"));
    };

    if !coupon.is_active {
        return Ok(CouponValidation::rejected("coupon is no longer active"));
    }
    if coupon.current_uses >= coupon.max_uses {
        return Ok(CouponValidation::rejected("coupon usage limit reached"));
    }
    if let Some(valid_until) = coupon.valid_until {
        if valid_until <= now() {
            return Ok(CouponValidation::rejected("coupon has expired"));
        }
    }

    Ok(CouponValidation::ok(coupon.discount_percent))
}

/// Consume one use of a coupon. A single guarded UPDATE, so two
/// concurrent redemptions of the last use cannot both succeed.
pub fn try_redeem_coupon(conn: &Connection, code: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE coupons SET current_uses = current_uses + 1
         WHERE code = ?1 COLLATE NOCASE
           AND is_active = 1
           AND current_uses < max_uses
           AND (valid_until IS NULL OR valid_until > ?2)",
        params![code.trim(), now()],
    )?;
    Ok(affected > 0)
}

// ============ Outbound emails ============

pub fn enqueue_email(
    conn: &Connection,
    order_id: &str,
    to_email: &str,
    subject: &str,
    template: &str,
    template_data: &str,
) -> Result<OutboundEmail> {
    let id = EntityType::OutboundEmail.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO outbound_emails (id, order_id, to_email, subject, template, template_data, status, attempts, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7, ?7)",
        params![&id, order_id, to_email, subject, template, template_data, now],
    )?;

    Ok(OutboundEmail {
        id,
        order_id: order_id.to_string(),
        to_email: to_email.to_string(),
        subject: subject.to_string(),
        template: template.to_string(),
        template_data: template_data.to_string(),
        status: EmailStatus::Pending,
        attempts: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn pending_emails(conn: &Connection, limit: i64) -> Result<Vec<OutboundEmail>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM outbound_emails WHERE status = 'pending' ORDER BY created_at LIMIT ?1",
            OUTBOUND_EMAIL_COLS
        ),
        &[&limit],
    )
}

pub fn emails_for_order(conn: &Connection, order_id: &str) -> Result<Vec<OutboundEmail>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM outbound_emails WHERE order_id = ?1 ORDER BY created_at",
            OUTBOUND_EMAIL_COLS
        ),
        &[&order_id],
    )
}

pub fn mark_email_sent(conn: &Connection, email_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE outbound_emails SET status = 'sent', attempts = attempts + 1, last_error = NULL, updated_at = ?1 WHERE id = ?2",
        params![now(), email_id],
    )?;
    Ok(())
}

pub fn mark_email_failed(conn: &Connection, email_id: &str, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE outbound_emails SET status = 'failed', attempts = attempts + 1, last_error = ?1, updated_at = ?2 WHERE id = ?3",
        params![error, now(), email_id],
    )?;
    Ok(())
}

// ============ Webhook events ============

/// Record a webhook event ID for replay prevention.
/// Returns true if this is a new event, false if already processed.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, provider, event_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![EntityType::WebhookEvent.gen_id(), provider, event_id, now()],
    )?;
    Ok(affected > 0)
}
