pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS solana_clusters (
    version TEXT,
    cluster TEXT,
    notified BOOLEAN DEFAULT FALSE,
    UNIQUE(version, cluster)
);

CREATE TABLE IF NOT EXISTS github_versions (
    name TEXT,
    version TEXT,
    notified BOOLEAN DEFAULT FALSE,
    UNIQUE(name, version)
);

CREATE TABLE IF NOT EXISTS programs (
    name TEXT,
    cluster TEXT,
    last_slot INT NOT NULL,
    notified BOOLEAN DEFAULT FALSE,
    UNIQUE(name, cluster)
);
"#;
