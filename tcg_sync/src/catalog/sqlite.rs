//! SQLite-backed storefront catalog.
//!
//! Products are keyed by a unique SKU. Multi-variant products keep their stock
//! on `sub_variants` rows; the parent row only carries the derived status.
//! Categories form a tree through `parent_id` (0 is the root).

use super::{
    AssetId, CatalogProduct, CatalogResult, CatalogStore, CategoryId, ProductDraft, ProductId,
    ProductKind, StockStatus, SubVariant, SubVariantDraft, SubVariantId, SyncSnapshot,
};
use crate::error::CatalogError;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use tcg_common::{Price, VariantKey};

const KIND_SIMPLE: &str = "simple";
const KIND_VARIABLE: &str = "variable";

pub struct SqliteCatalogStore {
    conn: Connection,
}

/// Columns read from `products`, before sub-variants and categories are attached
struct ProductRow {
    id: i64,
    sku: String,
    kind: String,
    name: String,
    description: String,
    managed: bool,
    stock: i64,
    status: String,
    price_cents: Option<i64>,
    image_asset_id: Option<i64>,
    snapshot: Option<String>,
}

const PRODUCT_COLUMNS: &str = "id, sku, kind, name, description, managed, stock, stock_status,
     price_cents, image_asset_id, snapshot";

fn read_product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        sku: row.get(1)?,
        kind: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        managed: row.get(5)?,
        stock: row.get(6)?,
        status: row.get(7)?,
        price_cents: row.get(8)?,
        image_asset_id: row.get(9)?,
        snapshot: row.get(10)?,
    })
}

fn price_from_db(cents: Option<i64>) -> Option<Price> {
    cents.map(|c| Price::from_cents(c.max(0) as u64))
}

fn price_to_db(price: Option<Price>) -> Option<i64> {
    price.map(|p| p.cents() as i64)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Creates the catalog tables if they do not already exist.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS products (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sku             TEXT NOT NULL UNIQUE,
            kind            TEXT NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            managed         INTEGER NOT NULL DEFAULT 1,
            stock           INTEGER NOT NULL DEFAULT 0,
            stock_status    TEXT NOT NULL,
            price_cents     INTEGER,
            image_asset_id  INTEGER,
            snapshot        TEXT,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sub_variants (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id      INTEGER NOT NULL REFERENCES products(id),
            variant_key     TEXT,
            stock           INTEGER NOT NULL,
            stock_status    TEXT NOT NULL,
            price_cents     INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_sub_variants_product ON sub_variants(product_id);

        CREATE TABLE IF NOT EXISTS categories (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id       INTEGER NOT NULL DEFAULT 0,
            name            TEXT NOT NULL,
            UNIQUE(parent_id, name)
        );

        CREATE TABLE IF NOT EXISTS product_categories (
            product_id      INTEGER NOT NULL REFERENCES products(id),
            category_id     INTEGER NOT NULL REFERENCES categories(id),
            PRIMARY KEY (product_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS assets (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            source_url      TEXT NOT NULL UNIQUE,
            bytes           BLOB NOT NULL,
            stored_at       TEXT NOT NULL
        );",
    )
}

fn replace_categories(
    tx: &Transaction<'_>,
    product: i64,
    categories: &[CategoryId],
) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM product_categories WHERE product_id = ?1",
        params![product],
    )?;
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO product_categories (product_id, category_id) VALUES (?1, ?2)",
    )?;
    for category in categories {
        stmt.execute(params![product, category.0])?;
    }
    Ok(())
}

impl SqliteCatalogStore {
    /// Opens (or creates) the catalog database and initialises the schema.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        log::info!("Catalog DB: {}", path.display());
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a product this system does not own (hand-made storefront listing)
    pub fn insert_unmanaged(&mut self, sku: &str, name: &str, stock: i64) -> CatalogResult<ProductId> {
        self.conn.execute(
            "INSERT INTO products (sku, kind, name, managed, stock, stock_status, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)",
            params![
                sku,
                KIND_SIMPLE,
                name,
                stock,
                StockStatus::from_stock(stock).as_str(),
                now()
            ],
        )?;
        Ok(ProductId(self.conn.last_insert_rowid()))
    }

    pub fn asset_bytes(&self, id: AssetId) -> CatalogResult<Option<Vec<u8>>> {
        Ok(self
            .conn
            .query_row(
                "SELECT bytes FROM assets WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn load_product(&self, row: ProductRow) -> CatalogResult<CatalogProduct> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT category_id FROM product_categories WHERE product_id = ?1 ORDER BY category_id")?;
        let categories = stmt
            .query_map(params![row.id], |r| Ok(CategoryId(r.get(0)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let kind = if row.kind == KIND_VARIABLE {
            ProductKind::Variable {
                sub_variants: self.load_sub_variants(row.id)?,
            }
        } else {
            ProductKind::Simple { stock: row.stock }
        };

        let snapshot = match row.snapshot.as_deref() {
            Some(json) => match serde_json::from_str::<SyncSnapshot>(json) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    log::warn!("Ignoring unreadable snapshot on product {}: {}", row.sku, e);
                    None
                }
            },
            None => None,
        };

        Ok(CatalogProduct {
            id: ProductId(row.id),
            sku: row.sku,
            name: row.name,
            description: row.description,
            managed: row.managed,
            status: StockStatus::parse(&row.status),
            price: price_from_db(row.price_cents),
            categories,
            image: row.image_asset_id.map(AssetId),
            kind,
            snapshot,
        })
    }

    fn load_sub_variants(&self, product: i64) -> CatalogResult<Vec<SubVariant>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, variant_key, stock, stock_status, price_cents
             FROM sub_variants WHERE product_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![product], |row| {
            let key: Option<String> = row.get(1)?;
            let status: String = row.get(3)?;
            Ok(SubVariant {
                id: SubVariantId(row.get(0)?),
                variant_key: key.as_deref().and_then(VariantKey::parse),
                stock: row.get(2)?,
                status: StockStatus::parse(&status),
                price: price_from_db(row.get(4)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn find_one(&self, clause: &str, param: &dyn rusqlite::ToSql) -> CatalogResult<Option<CatalogProduct>> {
        let sql = format!("SELECT {} FROM products WHERE {}", PRODUCT_COLUMNS, clause);
        let row = self
            .conn
            .query_row(&sql, [param], read_product_row)
            .optional()?;
        row.map(|r| self.load_product(r)).transpose()
    }

    fn product_kind(&self, id: ProductId) -> CatalogResult<String> {
        self.conn
            .query_row(
                "SELECT kind FROM products WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| CatalogError::NotFound(format!("product {}", id.0)))
    }

    fn write_listing(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        kind: &str,
        stock: i64,
    ) -> CatalogResult<ProductId> {
        let tx = self.conn.transaction()?;
        let id = match existing {
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE products SET
                        sku = ?1, kind = ?2, name = ?3, description = ?4,
                        stock = ?5, stock_status = ?6, price_cents = ?7, updated_at = ?8
                     WHERE id = ?9",
                    params![
                        draft.sku,
                        kind,
                        draft.name,
                        draft.description,
                        stock,
                        draft.status.as_str(),
                        price_to_db(draft.price),
                        now(),
                        id.0
                    ],
                )?;
                if changed == 0 {
                    return Err(CatalogError::NotFound(format!("product {}", id.0)));
                }
                id.0
            }
            None => {
                tx.execute(
                    "INSERT INTO products (
                        sku, kind, name, description, managed, stock, stock_status,
                        price_cents, updated_at
                     ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)",
                    params![
                        draft.sku,
                        kind,
                        draft.name,
                        draft.description,
                        stock,
                        draft.status.as_str(),
                        price_to_db(draft.price),
                        now()
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        if kind == KIND_SIMPLE {
            tx.execute("DELETE FROM sub_variants WHERE product_id = ?1", params![id])?;
        }
        replace_categories(&tx, id, &draft.categories)?;
        tx.commit()?;
        Ok(ProductId(id))
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn is_available(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    fn find_by_sku(&self, sku: &str) -> CatalogResult<Option<CatalogProduct>> {
        self.find_one("sku = ?1", &sku)
    }

    fn find_by_id(&self, id: ProductId) -> CatalogResult<Option<CatalogProduct>> {
        self.find_one("id = ?1", &id.0)
    }

    fn list_managed(&self) -> CatalogResult<Vec<CatalogProduct>> {
        let sql = format!(
            "SELECT {} FROM products WHERE managed = 1 ORDER BY id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_product_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|r| self.load_product(r)).collect()
    }

    fn upsert_simple(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        stock: i64,
    ) -> CatalogResult<ProductId> {
        self.write_listing(existing, draft, KIND_SIMPLE, stock)
    }

    fn upsert_variable(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
    ) -> CatalogResult<ProductId> {
        self.write_listing(existing, draft, KIND_VARIABLE, 0)
    }

    fn upsert_sub_variant(
        &mut self,
        parent: ProductId,
        draft: &SubVariantDraft,
    ) -> CatalogResult<SubVariantId> {
        if self.product_kind(parent)? != KIND_VARIABLE {
            return Err(CatalogError::Unsupported("sub-variants on a simple product"));
        }
        let status = draft.status();
        if let Some(id) = draft.id {
            let changed = self.conn.execute(
                "UPDATE sub_variants SET variant_key = ?1, stock = ?2, stock_status = ?3, price_cents = ?4
                 WHERE id = ?5 AND product_id = ?6",
                params![
                    draft.variant_key.as_str(),
                    draft.stock,
                    status.as_str(),
                    price_to_db(draft.price),
                    id.0,
                    parent.0
                ],
            )?;
            if changed > 0 {
                return Ok(id);
            }
            log::warn!(
                "Sub-variant {} no longer exists on product {}, creating a new one",
                id.0,
                parent.0
            );
        }
        self.conn.execute(
            "INSERT INTO sub_variants (product_id, variant_key, stock, stock_status, price_cents)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                parent.0,
                draft.variant_key.as_str(),
                draft.stock,
                status.as_str(),
                price_to_db(draft.price)
            ],
        )?;
        Ok(SubVariantId(self.conn.last_insert_rowid()))
    }

    fn set_sub_variant_stock(
        &mut self,
        parent: ProductId,
        id: SubVariantId,
        stock: i64,
    ) -> CatalogResult<()> {
        let changed = self.conn.execute(
            "UPDATE sub_variants SET stock = ?1, stock_status = ?2 WHERE id = ?3 AND product_id = ?4",
            params![stock, StockStatus::from_stock(stock).as_str(), id.0, parent.0],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(format!(
                "sub-variant {} of product {}",
                id.0, parent.0
            )));
        }
        Ok(())
    }

    fn delete_sub_variant(&mut self, parent: ProductId, id: SubVariantId) -> CatalogResult<()> {
        self.conn.execute(
            "DELETE FROM sub_variants WHERE id = ?1 AND product_id = ?2",
            params![id.0, parent.0],
        )?;
        Ok(())
    }

    fn delete_product(&mut self, id: ProductId) -> CatalogResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sub_variants WHERE product_id = ?1", params![id.0])?;
        tx.execute(
            "DELETE FROM product_categories WHERE product_id = ?1",
            params![id.0],
        )?;
        let removed = tx.execute("DELETE FROM products WHERE id = ?1", params![id.0])?;
        if removed == 0 {
            return Err(CatalogError::NotFound(format!("product {}", id.0)));
        }
        tx.commit()?;
        Ok(())
    }

    fn write_snapshot(&mut self, id: ProductId, snapshot: &SyncSnapshot) -> CatalogResult<()> {
        let json = serde_json::to_string(snapshot)?;
        let changed = self.conn.execute(
            "UPDATE products SET snapshot = ?1 WHERE id = ?2",
            params![json, id.0],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(format!("product {}", id.0)));
        }
        Ok(())
    }

    fn find_asset_by_source(&self, source_url: &str) -> CatalogResult<Option<AssetId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM assets WHERE source_url = ?1",
                params![source_url],
                |row| Ok(AssetId(row.get(0)?)),
            )
            .optional()?)
    }

    fn store_asset(&mut self, source_url: &str, bytes: &[u8]) -> CatalogResult<AssetId> {
        self.conn.execute(
            "INSERT INTO assets (source_url, bytes, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_url) DO UPDATE SET bytes = excluded.bytes, stored_at = excluded.stored_at",
            params![source_url, bytes, now()],
        )?;
        self.find_asset_by_source(source_url)?
            .ok_or_else(|| CatalogError::NotFound(format!("asset {}", source_url)))
    }

    fn attach_image(&mut self, id: ProductId, asset: AssetId) -> CatalogResult<()> {
        let changed = self.conn.execute(
            "UPDATE products SET image_asset_id = ?1 WHERE id = ?2",
            params![asset.0, id.0],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(format!("product {}", id.0)));
        }
        Ok(())
    }

    fn ensure_category_path(&mut self, path: &[String]) -> CatalogResult<Vec<CategoryId>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(path.len());
        let mut parent = 0i64;
        for name in path {
            let found: Option<i64> = tx
                .query_row(
                    "SELECT id FROM categories WHERE parent_id = ?1 AND name = ?2",
                    params![parent, name],
                    |row| row.get(0),
                )
                .optional()?;
            let id = match found {
                Some(id) => id,
                None => {
                    tx.execute(
                        "INSERT INTO categories (parent_id, name) VALUES (?1, ?2)",
                        params![parent, name],
                    )?;
                    log::debug!("Created category {:?} under {}", name, parent);
                    tx.last_insert_rowid()
                }
            };
            ids.push(CategoryId(id));
            parent = id;
        }
        tx.commit()?;
        Ok(ids)
    }
}
