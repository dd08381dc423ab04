use rusqlite::Connection;

/// Initialize the database schema.
///
/// The unique indexes here are load-bearing: license dedup and coupon
/// usage limits are enforced at this layer, not by read-then-write
/// checks in handlers.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Products (what the storefront sells)
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_active ON products(id) WHERE active = 1;

        -- Orders (one row per checkout initiation)
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL UNIQUE,
            customer_email TEXT NOT NULL,
            product_id TEXT NOT NULL REFERENCES products(id),
            product_name TEXT NOT NULL,
            duration TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            discount_cents INTEGER NOT NULL DEFAULT 0,
            total_cents INTEGER NOT NULL,
            coupon_code TEXT,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed', 'refunded', 'expired', 'cancelled')),
            payment_method TEXT,
            payment_session_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_email ON orders(customer_email);
        CREATE INDEX IF NOT EXISTS idx_orders_session ON orders(payment_session_id);
        CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at DESC);

        -- Licenses (at most one per customer/product pair)
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL UNIQUE,
            product_id TEXT NOT NULL REFERENCES products(id),
            product_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            duration TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('unused', 'active', 'expired', 'revoked')),
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_licenses_customer_product ON licenses(customer_email, product_id);
        CREATE INDEX IF NOT EXISTS idx_licenses_expiry ON licenses(expires_at) WHERE expires_at IS NOT NULL;

        -- Coupons (flat percentage discounts, case-insensitive codes)
        CREATE TABLE IF NOT EXISTS coupons (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL COLLATE NOCASE UNIQUE,
            discount_percent INTEGER NOT NULL CHECK (discount_percent BETWEEN 1 AND 100),
            max_uses INTEGER NOT NULL,
            current_uses INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            valid_until INTEGER,
            created_at INTEGER NOT NULL
        );

        -- Outbound email queue (drained by the dispatch endpoint)
        CREATE TABLE IF NOT EXISTS outbound_emails (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            to_email TEXT NOT NULL,
            subject TEXT NOT NULL,
            template TEXT NOT NULL,
            template_data TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'sent', 'failed')),
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_outbound_emails_pending ON outbound_emails(created_at) WHERE status = 'pending';
        CREATE INDEX IF NOT EXISTS idx_outbound_emails_order ON outbound_emails(order_id);

        -- Webhook events (replay prevention for deliveries carrying an event ID)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(provider, event_id)
        );
        "#,
    )?;
    Ok(())
}
