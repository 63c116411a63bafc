/// Idempotent schema creation, mirroring the teacher's `_ensure_*_table`
/// pattern (CREATE TABLE IF NOT EXISTS, safe to call on every startup).
/// Written in SQLite-compatible SQL so the same statements run against the
/// `sqlx::AnyPool` in both the Postgres production deployment and the
/// in-memory SQLite test pool.
pub async fn ensure_schema(pool: &sqlx::AnyPool) -> Result<(), sqlx::Error> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            ticker TEXT NOT NULL UNIQUE,
            cik TEXT,
            sector TEXT,
            industry TEXT,
            exchange TEXT,
            entity_type TEXT NOT NULL DEFAULT 'company',
            aliases TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            connector_type TEXT NOT NULL,
            deleted_at TEXT
        )",
        "CREATE TABLE IF NOT EXISTS source_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            excerpt TEXT NOT NULL,
            observed_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS insights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            source_name TEXT NOT NULL,
            source_url TEXT NOT NULL,
            text TEXT NOT NULL,
            recommendation TEXT NOT NULL DEFAULT '',
            threat_level TEXT NOT NULL,
            confidence REAL NOT NULL,
            evidence_ref TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            critic_status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS memory_chunks (
            source_id INTEGER NOT NULL,
            source_name TEXT NOT NULL,
            source_url TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            evidence_ref TEXT NOT NULL,
            embedding TEXT NOT NULL,
            PRIMARY KEY (source_id, content_hash, chunk_index)
        )",
        "CREATE TABLE IF NOT EXISTS source_evidence_relations (
            source_id INTEGER NOT NULL,
            evidence_ref TEXT NOT NULL,
            threat_level TEXT NOT NULL,
            PRIMARY KEY (source_id, evidence_ref)
        )",
        "CREATE TABLE IF NOT EXISTS financial_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            entity_id INTEGER,
            period_type TEXT NOT NULL,
            period_end TEXT NOT NULL,
            fiscal_year INTEGER NOT NULL,
            fiscal_quarter INTEGER,
            source_provider TEXT NOT NULL,
            income TEXT NOT NULL DEFAULT '{}',
            balance TEXT NOT NULL DEFAULT '{}',
            cash_flow TEXT NOT NULL DEFAULT '{}',
            key_metrics TEXT NOT NULL DEFAULT '{}',
            UNIQUE (ticker, period_type, period_end, source_provider)
        )",
        "CREATE TABLE IF NOT EXISTS macro_observations (
            series_id TEXT NOT NULL,
            series_name TEXT NOT NULL,
            observation_date TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY (series_id, observation_date)
        )",
        "CREATE TABLE IF NOT EXISTS social_signals (
            ticker TEXT NOT NULL,
            platform TEXT NOT NULL,
            signal_date TEXT NOT NULL,
            mention_count INTEGER NOT NULL,
            avg_sentiment REAL NOT NULL,
            top_posts TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (ticker, platform, signal_date)
        )",
        "CREATE TABLE IF NOT EXISTS entity_filings (
            accession_number TEXT PRIMARY KEY,
            ticker TEXT NOT NULL,
            cik TEXT,
            filing_type TEXT NOT NULL,
            filing_date TEXT NOT NULL,
            filing_url TEXT NOT NULL,
            description TEXT
        )",
        "CREATE TABLE IF NOT EXISTS entity_coverage (
            ticker TEXT PRIMARY KEY,
            entity_id INTEGER,
            has_financials INTEGER NOT NULL DEFAULT 0,
            financials_quarters INTEGER NOT NULL DEFAULT 0,
            has_filings INTEGER NOT NULL DEFAULT 0,
            filings_count INTEGER NOT NULL DEFAULT 0,
            has_macro INTEGER NOT NULL DEFAULT 0,
            has_social INTEGER NOT NULL DEFAULT 0,
            has_news INTEGER NOT NULL DEFAULT 0,
            has_price INTEGER NOT NULL DEFAULT 0,
            coverage_score REAL NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS search_queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query_text TEXT NOT NULL,
            ticker TEXT,
            answer TEXT NOT NULL,
            confidence REAL NOT NULL,
            risk_level TEXT NOT NULL,
            recommendation TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS search_evidence (
            search_id INTEGER NOT NULL,
            source_name TEXT NOT NULL,
            evidence_ref TEXT NOT NULL,
            confidence REAL NOT NULL,
            rank_score REAL NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS ingest_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            detail TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS failed_ingestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            error TEXT NOT NULL,
            retryable INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS audit_log (
            sequence_number INTEGER PRIMARY KEY,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            detail TEXT NOT NULL,
            prev_hash TEXT NOT NULL,
            entry_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
