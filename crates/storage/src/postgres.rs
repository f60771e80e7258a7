use async_trait::async_trait;
use chrono::Utc;
use common::{Money, ProductId, RequestId, RequestStatus, UserId};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LineItem, Page, Product, ProductType, Profile, PurchaseRequest, Result, StockLevel,
    StockMovement, StorageError, UserType,
    store::{ProductStore, ProfileDirectory, PurchaseRequestRepository},
};

const REQUEST_COLUMNS: &str =
    "id, customer_id, farmer_id, items, total_amount, message, status, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, farmer_id, name, category, subcategory, description, image_url, \
     product_type, price, quantity, is_active, created_at, updated_at";

/// Opens a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("negative {column}: {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StorageError::InvalidData(format!("quantity too large: {value}")))
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StorageError::InvalidData)
}

fn sql_limit(page: Page) -> Option<i64> {
    page.limit.map(|l| l as i64)
}

/// PostgreSQL-backed profile directory.
#[derive(Clone)]
pub struct PostgresProfileDirectory {
    pool: PgPool,
}

impl PostgresProfileDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: PgRow) -> Result<Profile> {
        Ok(Profile {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            user_type: parse_column::<UserType>(&row, "user_type")?,
            address: row.try_get("address")?,
        })
    }
}

#[async_trait]
impl ProfileDirectory for PostgresProfileDirectory {
    #[tracing::instrument(skip(self))]
    async fn get(&self, user_id: UserId) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT user_id, full_name, email, user_type, address FROM profiles WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_profile).transpose()
    }

    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn upsert(&self, profile: Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, full_name, email, user_type, address)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                user_type = EXCLUDED.user_type,
                address = EXCLUDED.address
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(profile.user_type.as_str())
        .bind(&profile.address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL-backed product store.
///
/// Sales run in a transaction: the movement ledger row and a conditional
/// `quantity >= n` decrement commit together, and the row lock taken by the
/// `UPDATE` serializes concurrent sales of the same product.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            farmer_id: UserId::from_uuid(row.try_get::<Uuid, _>("farmer_id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            subcategory: row.try_get("subcategory")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            product_type: parse_column::<ProductType>(&row, "product_type")?,
            price: Money::from_minor(row.try_get("price")?),
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn current_level<'e, E>(executor: E, id: &ProductId) -> Result<StockLevel>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query("SELECT quantity, is_active FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StorageError::product_not_found(id))?;
        let is_active: bool = row.try_get("is_active")?;
        Ok(StockLevel {
            product_id: id.clone(),
            remaining: to_u32(row.try_get("quantity")?, "quantity")?,
            deactivated: !is_active,
            applied: false,
        })
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, farmer_id, name, category, subcategory, description,
                image_url, product_type, price, quantity, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(product.id.as_str())
        .bind(product.farmer_id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.subcategory)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.product_type.as_str())
        .bind(product.price.minor())
        .bind(to_i32(product.quantity)?)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::Duplicate {
                    entity: "Product",
                    id: product.id.to_string(),
                };
            }
            StorageError::Database(e)
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_quantity(&self, id: &ProductId, quantity: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET quantity = $2, updated_at = $3 WHERE id = $1")
                .bind(id.as_str())
                .bind(to_i32(quantity)?)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::product_not_found(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate(&self, id: &ProductId) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = $2 WHERE id = $1")
                .bind(id.as_str())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::product_not_found(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_active(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY created_at DESC, seq DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    #[tracing::instrument(skip(self), fields(request_id = %movement.request_id, product_id = %movement.product_id))]
    async fn apply_sale(&self, movement: &StockMovement) -> Result<StockLevel> {
        let mut tx = self.pool.begin().await?;

        let already_applied: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM stock_movements WHERE request_id = $1 AND product_id = $2",
        )
        .bind(movement.request_id.as_uuid())
        .bind(movement.product_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if already_applied.is_some() {
            return Self::current_level(&mut *tx, &movement.product_id).await;
        }

        let quantity = to_i32(movement.quantity)?;
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET quantity = quantity - $2,
                is_active = (quantity - $2) > 0,
                updated_at = $3
            WHERE id = $1 AND is_active AND quantity >= $2
            RETURNING quantity
            "#,
        )
        .bind(movement.product_id.as_str())
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            let level = Self::current_level(&mut *tx, &movement.product_id).await?;
            return Err(if level.deactivated {
                StorageError::ProductInactive(movement.product_id.clone())
            } else {
                StorageError::InsufficientStock {
                    product_id: movement.product_id.clone(),
                    available: level.remaining,
                    requested: movement.quantity,
                }
            });
        };
        let deactivated = remaining == 0;

        let recorded = sqlx::query(
            r#"
            INSERT INTO stock_movements (request_id, product_id, quantity, deactivated, applied_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (request_id, product_id) DO NOTHING
            "#,
        )
        .bind(movement.request_id.as_uuid())
        .bind(movement.product_id.as_str())
        .bind(quantity)
        .bind(deactivated)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if recorded.rows_affected() == 0 {
            // A concurrent retry of the same movement committed first.
            tx.rollback().await?;
            return Self::current_level(&self.pool, &movement.product_id).await;
        }

        tx.commit().await?;
        metrics::counter!("stock_movements_applied_total").increment(1);
        tracing::debug!(remaining, deactivated, "stock movement applied");
        Ok(StockLevel {
            product_id: movement.product_id.clone(),
            remaining: to_u32(remaining, "quantity")?,
            deactivated,
            applied: true,
        })
    }

    #[tracing::instrument(skip(self), fields(request_id = %movement.request_id, product_id = %movement.product_id))]
    async fn revert_sale(&self, movement: &StockMovement) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let applied = sqlx::query(
            r#"
            DELETE FROM stock_movements
            WHERE request_id = $1 AND product_id = $2
            RETURNING quantity, deactivated
            "#,
        )
        .bind(movement.request_id.as_uuid())
        .bind(movement.product_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(applied) = applied else {
            return Ok(());
        };
        let quantity: i32 = applied.try_get("quantity")?;
        let deactivated: bool = applied.try_get("deactivated")?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity + $2,
                is_active = is_active OR $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(movement.product_id.as_str())
        .bind(quantity)
        .bind(deactivated)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::product_not_found(&movement.product_id));
        }

        tx.commit().await?;
        metrics::counter!("stock_movements_reverted_total").increment(1);
        tracing::debug!(quantity, "stock movement reverted");
        Ok(())
    }
}

/// PostgreSQL-backed purchase request repository.
///
/// Line items are stored as a JSONB array of `{product_id, quantity, unit_price}`.
#[derive(Clone)]
pub struct PostgresPurchaseRequestRepository {
    pool: PgPool,
}

impl PostgresPurchaseRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_request(row: PgRow) -> Result<PurchaseRequest> {
        let items: serde_json::Value = row.try_get("items")?;
        let items: Vec<LineItem> = serde_json::from_value(items)?;

        Ok(PurchaseRequest {
            id: RequestId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            farmer_id: UserId::from_uuid(row.try_get::<Uuid, _>("farmer_id")?),
            items,
            total_amount: Money::from_minor(row.try_get("total_amount")?),
            message: row.try_get("message")?,
            status: parse_column::<RequestStatus>(&row, "status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn stored_status(&self, id: RequestId) -> Result<RequestStatus> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM purchase_requests WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        status
            .ok_or_else(|| StorageError::request_not_found(id))?
            .parse()
            .map_err(StorageError::InvalidData)
    }

    async fn query_by(
        &self,
        column: &'static str,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM purchase_requests WHERE {column} = $1 \
             ORDER BY created_at DESC, seq DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id.as_uuid())
        .bind(page.offset as i64)
        .bind(sql_limit(page))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_request).collect()
    }
}

#[async_trait]
impl PurchaseRequestRepository for PostgresPurchaseRequestRepository {
    #[tracing::instrument(skip(self, request), fields(request_id = %request.id))]
    async fn insert(&self, request: PurchaseRequest) -> Result<()> {
        let items = serde_json::to_value(&request.items)?;

        sqlx::query(
            r#"
            INSERT INTO purchase_requests (id, customer_id, farmer_id, items, total_amount,
                message, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.customer_id.as_uuid())
        .bind(request.farmer_id.as_uuid())
        .bind(items)
        .bind(request.total_amount.minor())
        .bind(&request.message)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::Duplicate {
                    entity: "PurchaseRequest",
                    id: request.id.to_string(),
                };
            }
            StorageError::Database(e)
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM purchase_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_request).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<PurchaseRequest> {
        let row = sqlx::query(&format!(
            "UPDATE purchase_requests SET status = $3, updated_at = $4 \
             WHERE id = $1 AND status = $2 RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_request(row),
            None => Err(StorageError::StatusConflict {
                id,
                actual: self.stored_status(id).await?,
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: RequestId, allowed: &[RequestStatus]) -> Result<()> {
        let allowed: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        let result =
            sqlx::query("DELETE FROM purchase_requests WHERE id = $1 AND status = ANY($2)")
                .bind(id.as_uuid())
                .bind(allowed)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::StatusConflict {
                id,
                actual: self.stored_status(id).await?,
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn query_by_customer(
        &self,
        customer_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        self.query_by("customer_id", customer_id, page).await
    }

    #[tracing::instrument(skip(self))]
    async fn query_by_farmer(&self, farmer_id: UserId, page: Page) -> Result<Vec<PurchaseRequest>> {
        self.query_by("farmer_id", farmer_id, page).await
    }
}
