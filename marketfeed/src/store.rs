//! Document Store Gateway (spec.md §2, §4.10): typed accessors over MongoDB
//! collections, idempotent index creation, chunked unordered bulk upserts
//! with exponential-backoff retry, and the `ObjectId`↔`String` boundary
//! conversion. Grounded on the teacher's pattern of centralizing all
//! provider-facing I/O behind one gateway (`borsa::core::BorsaCore`) so
//! nothing upstream touches the wire format directly — here nothing
//! upstream touches BSON directly.

use bson::oid::ObjectId;
use bson::{Document, doc};
use futures::stream::{self, StreamExt};
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Serialize;
use serde::de::DeserializeOwned;

use marketfeed_types::BackoffConfig;
use marketfeed_types::PlatformError;
use marketfeed_types::model::{
    AnalysisReport, AnalysisTask, FinancialStatement, HistoricalBar, MarketQuote, Notification,
    StockBasics, SyncStatus,
};

const CHUNK_SIZE: usize = 500;
const MAX_CONCURRENT_UPSERTS: usize = 16;

/// One document ready to be upserted: a Mongo filter identifying its unique
/// key, and the serialized replacement body.
pub struct UpsertOp {
    /// Unique-index filter, e.g. `{code: ..., source: ...}`.
    pub filter: Document,
    /// `$set` payload.
    pub body: Document,
}

fn mongo_store_error(context: &str, e: &mongodb::error::Error) -> PlatformError {
    PlatformError::Store(format!("{context}: {e}"))
}

/// Gateway over one MongoDB database. Cloning is cheap (the underlying
/// `mongodb::Client` is itself a handle around a connection pool).
#[derive(Clone)]
pub struct DocumentStore {
    db: Database,
}

impl DocumentStore {
    /// Connect and select a database. Does not create indexes; call
    /// [`Self::ensure_indexes`] once at startup.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, PlatformError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| mongo_store_error("connect", &e))?;
        Ok(Self { db: client.database(db_name) })
    }

    fn stock_basic_info(&self) -> Collection<Document> {
        self.db.collection("stock_basic_info")
    }
    fn market_quotes(&self) -> Collection<Document> {
        self.db.collection("market_quotes")
    }
    fn stock_daily_quotes(&self) -> Collection<Document> {
        self.db.collection("stock_daily_quotes")
    }
    fn financial_statements(&self) -> Collection<Document> {
        self.db.collection("financial_statements")
    }
    fn analysis_tasks(&self) -> Collection<Document> {
        self.db.collection("analysis_tasks")
    }
    fn analysis_reports(&self) -> Collection<Document> {
        self.db.collection("analysis_reports")
    }
    fn sync_status(&self) -> Collection<Document> {
        self.db.collection("sync_status")
    }
    fn notifications(&self) -> Collection<Document> {
        self.db.collection("notifications")
    }
    fn data_source_groupings(&self) -> Collection<Document> {
        self.db.collection("data_source_groupings")
    }

    /// Create every index named in spec.md §6. Best-effort and idempotent:
    /// `createIndexes` is a no-op when an identical index already exists,
    /// matching the spec's "non-blocking, idempotent" requirement.
    pub async fn ensure_indexes(&self) -> Result<(), PlatformError> {
        let unique = |keys: Document| {
            IndexModel::builder().keys(keys).options(IndexOptions::builder().unique(true).build()).build()
        };
        let plain = |keys: Document| IndexModel::builder().keys(keys).build();

        self.stock_basic_info()
            .create_indexes(vec![
                unique(doc! {"code": 1, "source": 1}),
                plain(doc! {"name": 1}),
                plain(doc! {"industry": 1}),
                plain(doc! {"market": 1}),
                plain(doc! {"total_mv": -1}),
                plain(doc! {"circ_mv": -1}),
                plain(doc! {"updated_at": -1}),
                plain(doc! {"turnover_rate": -1}),
                plain(doc! {"pe": 1}),
                plain(doc! {"pb": 1}),
            ])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(stock_basic_info)", &e))?;

        self.market_quotes()
            .create_indexes(vec![unique(doc! {"code": 1}), plain(doc! {"updated_at": 1})])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(market_quotes)", &e))?;

        self.stock_daily_quotes()
            .create_indexes(vec![
                unique(doc! {"symbol": 1, "trade_date": 1, "data_source": 1, "period": 1}),
                plain(doc! {"symbol": 1}),
                plain(doc! {"trade_date": -1}),
                plain(doc! {"symbol": 1, "trade_date": -1}),
            ])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(stock_daily_quotes)", &e))?;

        self.analysis_tasks()
            .create_indexes(vec![
                unique(doc! {"task_id": 1}),
                plain(doc! {"user_id": 1}),
                plain(doc! {"status": 1}),
                plain(doc! {"created_at": 1}),
            ])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(analysis_tasks)", &e))?;

        // Compound (data_type, job) is the primary upsert identity (spec.md
        // §9's open question, decided in DESIGN.md); plain `job` is kept as
        // a fallback lookup key for documents predating the partition.
        self.sync_status()
            .create_indexes(vec![plain(doc! {"data_type": 1, "job": 1}), plain(doc! {"job": 1})])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(sync_status)", &e))?;

        self.notifications()
            .create_indexes(vec![
                plain(doc! {"user_id": 1, "created_at": -1}),
                plain(doc! {"user_id": 1, "read": 1}),
            ])
            .await
            .map_err(|e| mongo_store_error("ensure_indexes(notifications)", &e))?;

        Ok(())
    }

    /// Chunk `ops` into groups of up to [`CHUNK_SIZE`], execute each
    /// chunk's upserts concurrently and unordered (spec.md §5: `bulk_write`
    /// with `ordered=false`), retrying a chunk on transient failure with
    /// exponential backoff. Returns the total number of documents
    /// successfully written; a chunk that still fails after `backoff.
    /// max_attempts` contributes its size to the returned error count
    /// instead of aborting the whole run (spec.md §7: ingestion continues
    /// with `success_with_errors`).
    pub async fn bulk_upsert(
        &self,
        collection: &Collection<Document>,
        ops: Vec<UpsertOp>,
        backoff: BackoffConfig,
    ) -> (u64, u64) {
        let mut written = 0u64;
        let mut errored = 0u64;
        for chunk in ops.chunks(CHUNK_SIZE) {
            let (ok, err) = self.upsert_chunk_with_retry(collection, chunk, backoff).await;
            written += ok;
            errored += err;
        }
        (written, errored)
    }

    async fn upsert_chunk_with_retry(
        &self,
        collection: &Collection<Document>,
        chunk: &[UpsertOp],
        backoff: BackoffConfig,
    ) -> (u64, u64) {
        let mut attempt = 1;
        loop {
            let results: Vec<Result<(), mongodb::error::Error>> = stream::iter(chunk)
                .map(|op| async move {
                    let opts = UpdateOptions::builder().upsert(true).build();
                    collection
                        .update_one(op.filter.clone(), doc! {"$set": op.body.clone()})
                        .with_options(opts)
                        .await
                        .map(|_| ())
                })
                .buffer_unordered(MAX_CONCURRENT_UPSERTS)
                .collect()
                .await;

            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed == 0 {
                return (chunk.len() as u64, 0);
            }
            if attempt >= backoff.max_attempts {
                return ((chunk.len() - failed) as u64, failed as u64);
            }
            tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Replace (upserting) one document by its unique filter, outside the
    /// chunked-bulk path — used for single-document writes (task state,
    /// notifications) where a per-call retry loop would be overkill.
    pub async fn upsert_one(
        &self,
        collection: &Collection<Document>,
        filter: Document,
        body: Document,
    ) -> Result<(), PlatformError> {
        let opts = UpdateOptions::builder().upsert(true).build();
        collection
            .update_one(filter, doc! {"$set": body})
            .with_options(opts)
            .await
            .map(|_| ())
            .map_err(|e| mongo_store_error("upsert_one", &e))
    }

    /// Find one document matching `filter`, deserializing it through a
    /// typed [`Collection<T>`] view of the same underlying collection.
    pub async fn find_one<T: DeserializeOwned + Unpin + Send + Sync>(
        &self,
        collection: &Collection<Document>,
        filter: Document,
    ) -> Result<Option<T>, PlatformError> {
        let typed: Collection<T> = collection.clone_with_type();
        typed.find_one(filter).await.map_err(|e| mongo_store_error("find_one", &e))
    }

    /// Accessors below give callers a typed view without leaking the
    /// underlying `Document`/`ObjectId` representation; `new_object_id`
    /// is the only place this module's callers mint an id for a fresh
    /// document.

    /// Collection view for `StockBasics`.
    #[must_use]
    pub fn stock_basics(&self) -> Collection<StockBasics> {
        self.stock_basic_info().clone_with_type()
    }
    /// Collection view for `MarketQuote`.
    #[must_use]
    pub fn market_quote(&self) -> Collection<MarketQuote> {
        self.market_quotes().clone_with_type()
    }
    /// Collection view for `HistoricalBar`.
    #[must_use]
    pub fn historical_bar(&self) -> Collection<HistoricalBar> {
        self.stock_daily_quotes().clone_with_type()
    }
    /// Collection view for `FinancialStatement`.
    #[must_use]
    pub fn financial_statement(&self) -> Collection<FinancialStatement> {
        self.financial_statements().clone_with_type()
    }
    /// Collection view for `AnalysisTask`.
    #[must_use]
    pub fn analysis_task(&self) -> Collection<AnalysisTask> {
        self.analysis_tasks().clone_with_type()
    }
    /// Collection view for `AnalysisReport`.
    #[must_use]
    pub fn analysis_report(&self) -> Collection<AnalysisReport> {
        self.analysis_reports().clone_with_type()
    }
    /// Collection view for `SyncStatus`.
    #[must_use]
    pub fn sync_status_typed(&self) -> Collection<SyncStatus> {
        self.sync_status().clone_with_type()
    }
    /// Collection view for `Notification`.
    #[must_use]
    pub fn notification(&self) -> Collection<Notification> {
        self.notifications().clone_with_type()
    }
    /// Collection view for `DataSourceGrouping` overrides.
    #[must_use]
    pub fn data_source_grouping(&self) -> Collection<marketfeed_types::model::DataSourceGrouping> {
        self.data_source_groupings().clone_with_type()
    }

    /// Untyped handle for callers that build raw filters (ingestion writers).
    #[must_use]
    pub fn raw_stock_basic_info(&self) -> Collection<Document> {
        self.stock_basic_info()
    }
    /// Untyped handle for `market_quotes`.
    #[must_use]
    pub fn raw_market_quotes(&self) -> Collection<Document> {
        self.market_quotes()
    }
    /// Untyped handle for `stock_daily_quotes`.
    #[must_use]
    pub fn raw_stock_daily_quotes(&self) -> Collection<Document> {
        self.stock_daily_quotes()
    }
    /// Untyped handle for `financial_statements`.
    #[must_use]
    pub fn raw_financial_statements(&self) -> Collection<Document> {
        self.financial_statements()
    }
    /// Untyped handle for `sync_status`.
    #[must_use]
    pub fn raw_sync_status(&self) -> Collection<Document> {
        self.sync_status()
    }
    /// Untyped handle for `analysis_tasks`.
    #[must_use]
    pub fn raw_analysis_tasks(&self) -> Collection<Document> {
        self.analysis_tasks()
    }
    /// Untyped handle for `analysis_reports`.
    #[must_use]
    pub fn raw_analysis_reports(&self) -> Collection<Document> {
        self.analysis_reports()
    }
    /// Untyped handle for `notifications`.
    #[must_use]
    pub fn raw_notifications(&self) -> Collection<Document> {
        self.notifications()
    }
}

/// Mint a fresh Mongo id for a document not yet persisted, returned in its
/// string form since domain structs never carry a raw `ObjectId`.
#[must_use]
pub fn new_object_id() -> String {
    ObjectId::new().to_hex()
}

/// `id: Some(s)` parses back into a real `ObjectId`; used when a caller
/// needs the bson filter form (`{"_id": ...}`) rather than the string form.
pub fn parse_object_id(id: &str) -> Result<ObjectId, PlatformError> {
    ObjectId::parse_str(id).map_err(|e| PlatformError::InvalidArg(format!("invalid object id {id}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_object_id_round_trips_through_parse() {
        let id = new_object_id();
        assert!(parse_object_id(&id).is_ok());
    }

    #[test]
    fn parse_object_id_rejects_garbage() {
        assert!(parse_object_id("not-an-id").is_err());
    }
}
