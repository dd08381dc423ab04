//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models implement to define
//! how they are constructed from database rows, plus helper functions for
//! common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PRODUCT_COLS: &str = "id, slug, name, active, created_at";

pub const ORDER_COLS: &str = "id, order_number, customer_email, product_id, product_name, duration, amount_cents, discount_cents, total_cents, coupon_code, status, payment_method, payment_session_id, created_at, updated_at";

pub const LICENSE_COLS: &str = "id, license_key, product_id, product_name, customer_email, duration, status, expires_at, created_at, updated_at";

pub const COUPON_COLS: &str =
    "id, code, discount_percent, max_uses, current_uses, is_active, valid_until, created_at";

pub const OUTBOUND_EMAIL_COLS: &str = "id, order_id, to_email, subject, template, template_data, status, attempts, last_error, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            active: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            order_number: row.get(1)?,
            customer_email: row.get(2)?,
            product_id: row.get(3)?,
            product_name: row.get(4)?,
            duration: row.get(5)?,
            amount_cents: row.get(6)?,
            discount_cents: row.get(7)?,
            total_cents: row.get(8)?,
            coupon_code: row.get(9)?,
            status: parse_enum(row, 10, "status")?,
            payment_method: row.get(11)?,
            payment_session_id: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key: row.get(1)?,
            product_id: row.get(2)?,
            product_name: row.get(3)?,
            customer_email: row.get(4)?,
            duration: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            expires_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Coupon {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Coupon {
            id: row.get(0)?,
            code: row.get(1)?,
            discount_percent: row.get(2)?,
            max_uses: row.get(3)?,
            current_uses: row.get(4)?,
            is_active: row.get(5)?,
            valid_until: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for OutboundEmail {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OutboundEmail {
            id: row.get(0)?,
            order_id: row.get(1)?,
            to_email: row.get(2)?,
            subject: row.get(3)?,
            template: row.get(4)?,
            template_data: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            attempts: row.get(7)?,
            last_error: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}
