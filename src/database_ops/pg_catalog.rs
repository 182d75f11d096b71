use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, Postgres, QueryBuilder, Row, Transaction};
use std::collections::HashMap;
use tracing::instrument;

use crate::catalog::models::{
    Asset, Brand, CatalogEntry, Color, PriceObservation, Product, ScrapedProduct, Variant,
    VariantHistory,
};
use crate::catalog::reconcile::{reconcile, CatalogGateway, ReconcileOutcome};
use crate::util::db::Db;
use crate::database_ops::store::CatalogStore;

const VARIANT_COLUMNS: &str = "id, product_id, size, color, assets, is_deprecated";
const PRICE_COLUMNS: &str = "id, variant_id, price, created_at, in_stock";

fn brand_from_row(r: &PgRow) -> Result<Brand> {
    Ok(Brand {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
    })
}

fn product_from_row(r: &PgRow) -> Result<Product> {
    Ok(Product {
        id: r.try_get("id")?,
        brand_id: r.try_get("brand_id")?,
        name: r.try_get("name")?,
        is_deprecated: r.try_get("is_deprecated")?,
    })
}

fn variant_from_row(r: &PgRow) -> Result<Variant> {
    let color: Option<Json<Color>> = r.try_get("color")?;
    let assets: Json<Vec<Asset>> = r.try_get("assets")?;
    Ok(Variant {
        id: r.try_get("id")?,
        product_id: r.try_get("product_id")?,
        size: r.try_get("size")?,
        color: color.map(|c| c.0),
        assets: assets.0,
        is_deprecated: r.try_get("is_deprecated")?,
    })
}

fn price_from_row(r: &PgRow) -> Result<PriceObservation> {
    Ok(PriceObservation {
        id: r.try_get("id")?,
        variant_id: r.try_get("variant_id")?,
        price: r.try_get("price")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        in_stock: r.try_get("in_stock")?,
    })
}

/// Gateway bound to one open transaction.
pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
}

impl PgCatalogTx {
    pub async fn begin(db: &Db) -> Result<Self> {
        let tx = db.pool.begin().await.context("beginning transaction")?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("committing transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("rolling back transaction")
    }
}

#[async_trait]
impl CatalogGateway for PgCatalogTx {
    async fn find_brand(&mut self, id: i64) -> Result<Option<Brand>> {
        sqlx::query("SELECT id, name FROM brands WHERE id = $1 LIMIT 1")
            .persistent(false)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .as_ref()
            .map(brand_from_row)
            .transpose()
    }

    async fn find_product(&mut self, id: i64) -> Result<Option<Product>> {
        sqlx::query("SELECT id, brand_id, name, is_deprecated FROM products WHERE id = $1 LIMIT 1")
            .persistent(false)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .as_ref()
            .map(product_from_row)
            .transpose()
    }

    async fn find_variants_by_product(&mut self, product_id: i64) -> Result<Vec<Variant>> {
        let sql = format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE product_id = $1 ORDER BY id");
        sqlx::query(&sql)
            .persistent(false)
            .bind(product_id)
            .fetch_all(&mut *self.tx)
            .await?
            .iter()
            .map(variant_from_row)
            .collect()
    }

    async fn insert_brand(&mut self, brand: &Brand) -> Result<Brand> {
        let row = sqlx::query("INSERT INTO brands (id, name) VALUES ($1, $2) RETURNING id, name")
            .persistent(false)
            .bind(brand.id)
            .bind(&brand.name)
            .fetch_one(&mut *self.tx)
            .await?;
        brand_from_row(&row)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<Product> {
        let row = sqlx::query(
            "INSERT INTO products (id, brand_id, name, is_deprecated) VALUES ($1, $2, $3, $4)
             RETURNING id, brand_id, name, is_deprecated",
        )
        .persistent(false)
        .bind(product.id)
        .bind(product.brand_id)
        .bind(&product.name)
        .bind(product.is_deprecated)
        .fetch_one(&mut *self.tx)
        .await?;
        product_from_row(&row)
    }

    async fn insert_variants(&mut self, variants: &[Variant]) -> Result<Vec<Variant>> {
        if variants.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO variants (id, product_id, size, color, assets, is_deprecated) ",
        );
        qb.push_values(variants, |mut b, v| {
            b.push_bind(v.id)
                .push_bind(v.product_id)
                .push_bind(v.size.clone())
                .push_bind(v.color.clone().map(Json))
                .push_bind(Json(v.assets.clone()))
                .push_bind(v.is_deprecated);
        });
        qb.push(" RETURNING ");
        qb.push(VARIANT_COLUMNS);
        qb.build()
            .persistent(false)
            .fetch_all(&mut *self.tx)
            .await?
            .iter()
            .map(variant_from_row)
            .collect()
    }

    async fn insert_prices(&mut self, prices: &[PriceObservation]) -> Result<Vec<PriceObservation>> {
        if prices.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO prices (id, variant_id, price, created_at, in_stock) ",
        );
        qb.push_values(prices, |mut b, p| {
            b.push_bind(p.id.clone())
                .push_bind(p.variant_id)
                .push_bind(p.price)
                .push_bind(p.created_at)
                .push_bind(p.in_stock);
        });
        qb.push(" RETURNING ");
        qb.push(PRICE_COLUMNS);
        qb.build()
            .persistent(false)
            .fetch_all(&mut *self.tx)
            .await?
            .iter()
            .map(price_from_row)
            .collect()
    }
}

/// PostgreSQL-backed catalog. Every reconciliation runs in its own transaction.
#[derive(Clone)]
pub struct PgCatalogStore {
    db: Db,
}

impl PgCatalogStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn known_product_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM products ORDER BY id")
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await
            .context("listing known products")?;
        Ok(ids)
    }

    #[instrument(skip(self, record), fields(product_id = record.id))]
    async fn reconcile(&self, record: &ScrapedProduct) -> Result<ReconcileOutcome> {
        let mut tx = PgCatalogTx::begin(&self.db).await?;
        match reconcile(&mut tx, record, Utc::now()).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let pool = &self.db.pool;
        let brands: HashMap<i64, Brand> = sqlx::query("SELECT id, name FROM brands")
            .persistent(false)
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| brand_from_row(r).map(|b| (b.id, b)))
            .collect::<Result<_>>()?;
        let products: Vec<Product> =
            sqlx::query("SELECT id, brand_id, name, is_deprecated FROM products ORDER BY id")
                .persistent(false)
                .fetch_all(pool)
                .await?
                .iter()
                .map(product_from_row)
                .collect::<Result<_>>()?;
        let variants: Vec<Variant> =
            sqlx::query(&format!("SELECT {VARIANT_COLUMNS} FROM variants ORDER BY id"))
                .persistent(false)
                .fetch_all(pool)
                .await?
                .iter()
                .map(variant_from_row)
                .collect::<Result<_>>()?;
        let mut prices_by_variant: HashMap<i64, Vec<PriceObservation>> = HashMap::new();
        for row in sqlx::query(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices ORDER BY variant_id, created_at DESC"
        ))
        .persistent(false)
        .fetch_all(pool)
        .await?
        .iter()
        {
            let price = price_from_row(row)?;
            prices_by_variant.entry(price.variant_id).or_default().push(price);
        }

        let mut variants_by_product: HashMap<i64, Vec<VariantHistory>> = HashMap::new();
        for variant in variants {
            let prices = prices_by_variant.remove(&variant.id).unwrap_or_default();
            variants_by_product
                .entry(variant.product_id)
                .or_default()
                .push(VariantHistory { variant, prices });
        }

        Ok(products
            .into_iter()
            .map(|product| CatalogEntry {
                brand: brands.get(&product.brand_id).cloned(),
                variants: variants_by_product.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}
