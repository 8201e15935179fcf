//! Topology-aware DDL generation.
//!
//! One [`TableSpec`] or [`ViewSpec`] renders to either shape:
//! - Standalone: a single object using the engine directly
//! - Clustered: a `<name>_replicated` object created `ON CLUSTER` with the
//!   `Replicated*` engine variant, plus a `Distributed` router named `<name>`
//!
//! Generation performs no I/O. It fails only on malformed specs.

use migrate_core::{literal, Error, Ident, Result};

/// Cluster macro expanded by every node.
pub const CLUSTER: &str = "{cluster}";

/// Replica macro expanded by every node.
pub const REPLICA: &str = "{replica}";

/// Replication path template. `{version}` is filled in here; the remaining
/// placeholders are server macros.
pub const REPLICATION_PATH: &str =
    "/clickhouse/{installation}/{cluster}/tables/{shard}/analytics/v{version}/{table}";

/// Suffix of the shard-local object behind a distributed router.
pub const REPLICATED_SUFFIX: &str = "_replicated";

/// Sharding expression used when a table does not name one.
pub const DEFAULT_DISTRIBUTION_HASH: &str = "rand()";

/// Name of the shard-local object for a logical table.
pub fn replicated(name: &Ident) -> Ident {
    name.with_suffix(REPLICATED_SUFFIX)
}

/// Replication path for a given layout version.
pub fn replication_path(version: u32) -> String {
    REPLICATION_PATH.replace("{version}", &version.to_string())
}

fn on_cluster() -> String {
    format!("ON CLUSTER {}", literal(CLUSTER))
}

/// Reject empty expressions and anything that could end the statement early.
fn check_expr(what: &str, expr: &str) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(Error::schema(format!("{} must not be empty", what)));
    }
    if expr.contains(';') {
        return Err(Error::schema(format!(
            "{} must not contain ';': {}",
            what, expr
        )));
    }
    Ok(())
}

/// Storage engine families used by the schema set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Engine {
    MergeTree,
    /// Keeps the row with the highest `version` per ordering key.
    ReplacingMergeTree { version: Option<String> },
    /// Collapses rows with opposite `sign` and equal `version`.
    VersionedCollapsingMergeTree { sign: String, version: String },
    AggregatingMergeTree,
    SummingMergeTree { columns: Vec<String> },
}

impl Engine {
    pub fn family(&self) -> &'static str {
        match self {
            Self::MergeTree => "MergeTree",
            Self::ReplacingMergeTree { .. } => "ReplacingMergeTree",
            Self::VersionedCollapsingMergeTree { .. } => "VersionedCollapsingMergeTree",
            Self::AggregatingMergeTree => "AggregatingMergeTree",
            Self::SummingMergeTree { .. } => "SummingMergeTree",
        }
    }

    fn args(&self) -> Result<Vec<String>> {
        let args = match self {
            Self::MergeTree | Self::AggregatingMergeTree => vec![],
            Self::ReplacingMergeTree { version } => match version {
                Some(v) => vec![Ident::new(v.as_str())?.to_string()],
                None => vec![],
            },
            Self::VersionedCollapsingMergeTree { sign, version } => vec![
                Ident::new(sign.as_str())?.to_string(),
                Ident::new(version.as_str())?.to_string(),
            ],
            Self::SummingMergeTree { columns } if columns.is_empty() => vec![],
            Self::SummingMergeTree { columns } => {
                let cols = columns
                    .iter()
                    .map(|c| Ident::new(c.as_str()).map(|i| i.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                vec![format!("({})", cols.join(", "))]
            }
        };
        Ok(args)
    }

    /// Engine clause for a standalone object, e.g. `MergeTree()`.
    pub fn render(&self) -> Result<String> {
        Ok(format!("{}({})", self.family(), self.args()?.join(", ")))
    }

    /// Engine clause for the shard-local object of a clustered spec.
    pub fn render_replicated(&self, version: u32) -> Result<String> {
        let mut args = vec![literal(&replication_path(version)), literal(REPLICA)];
        args.extend(self.args()?);
        Ok(format!("Replicated{}({})", self.family(), args.join(", ")))
    }
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// ClickHouse type, e.g. `LowCardinality(String)`
    pub ty: String,
    pub default: Option<String>,
    /// Compression codec list, e.g. `ZSTD(3)`
    pub codec: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default: None,
            codec: None,
        }
    }

    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    /// Render as `name Type [DEFAULT expr] [CODEC(...)]`.
    pub fn render(&self) -> Result<String> {
        self.render_with(true)
    }

    fn render_with(&self, with_codec: bool) -> Result<String> {
        let name = Ident::new(self.name.as_str())?;
        check_expr(&format!("type of column {}", self.name), &self.ty)?;

        let mut out = format!("{} {}", name, self.ty);
        if let Some(ref default) = self.default {
            check_expr(&format!("default of column {}", self.name), default)?;
            out.push_str(&format!(" DEFAULT {}", default));
        }
        if with_codec {
            if let Some(ref codec) = self.codec {
                check_expr(&format!("codec of column {}", self.name), codec)?;
                out.push_str(&format!(" CODEC({})", codec));
            }
        }
        Ok(out)
    }
}

/// Shorthand for [`ColumnDef::new`].
pub fn column(name: &str, ty: &str) -> ColumnDef {
    ColumnDef::new(name, ty)
}

/// A data-skipping index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub expr: String,
    /// Index type, e.g. `bloom_filter` or `minmax`
    pub kind: String,
    pub granularity: u32,
}

impl IndexDef {
    pub fn new(name: &str, expr: &str, kind: &str, granularity: u32) -> Self {
        Self {
            name: name.to_string(),
            expr: expr.to_string(),
            kind: kind.to_string(),
            granularity,
        }
    }

    pub fn render(&self) -> Result<String> {
        let name = Ident::new(self.name.as_str())?;
        check_expr(&format!("expression of index {}", self.name), &self.expr)?;
        check_expr(&format!("type of index {}", self.name), &self.kind)?;
        Ok(format!(
            "INDEX {} {} TYPE {} GRANULARITY {}",
            name,
            self.expr,
            self.kind,
            self.granularity.max(1)
        ))
    }
}

/// Clauses shared by tables and views.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StorageClauses<'a> {
    partition_by: Option<&'a str>,
    order_by: &'a [String],
    ttl: Option<&'a str>,
    settings: &'a [(String, String)],
}

impl StorageClauses<'_> {
    fn render(&self) -> Result<String> {
        let mut lines = Vec::new();

        if let Some(partition) = self.partition_by {
            check_expr("partition expression", partition)?;
            lines.push(format!("PARTITION BY {}", partition));
        }

        if self.order_by.is_empty() {
            lines.push("ORDER BY tuple()".to_string());
        } else {
            for expr in self.order_by {
                check_expr("ordering key expression", expr)?;
            }
            lines.push(format!("ORDER BY ({})", self.order_by.join(", ")));
        }

        if let Some(ttl) = self.ttl {
            check_expr("TTL expression", ttl)?;
            lines.push(format!("TTL {}", ttl));
        }

        if !self.settings.is_empty() {
            let settings = self
                .settings
                .iter()
                .map(|(key, value)| {
                    let key = Ident::new(key.as_str())?;
                    if !key.is_bare() {
                        return Err(Error::schema(format!("invalid setting name: {}", key.as_str())));
                    }
                    check_expr(&format!("setting {}", key.as_str()), value)?;
                    Ok(format!("{} = {}", key, value))
                })
                .collect::<Result<Vec<_>>>()?;
            lines.push(format!("SETTINGS {}", settings.join(", ")));
        }

        Ok(lines.join("\n"))
    }
}

/// Declarative description of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indices: Vec<IndexDef>,
    pub engine: Engine,
    /// Ordering key expressions; empty means `tuple()`
    pub order_by: Vec<String>,
    pub partition_by: Option<String>,
    pub ttl: Option<String>,
    pub settings: Vec<(String, String)>,
    /// Sharding expression for the distributed router
    pub distribution_hash: String,
    /// Bump to create the table under a fresh replication path
    pub replicated_version: u32,
    pub is_clustered: bool,
}

impl TableSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indices: Vec::new(),
            engine: Engine::MergeTree,
            order_by: Vec::new(),
            partition_by: None,
            ttl: None,
            settings: Vec::new(),
            distribution_hash: DEFAULT_DISTRIBUTION_HASH.to_string(),
            replicated_version: 1,
            is_clustered: false,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indices.push(index);
        self
    }

    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn order_by<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn partition_by(mut self, expr: &str) -> Self {
        self.partition_by = Some(expr.to_string());
        self
    }

    pub fn ttl(mut self, expr: &str) -> Self {
        self.ttl = Some(expr.to_string());
        self
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.settings.push((key.to_string(), value.to_string()));
        self
    }

    pub fn distribution_hash(mut self, expr: &str) -> Self {
        self.distribution_hash = expr.to_string();
        self
    }

    pub fn replicated_version(mut self, version: u32) -> Self {
        self.replicated_version = version;
        self
    }

    pub fn clustered(mut self, is_clustered: bool) -> Self {
        self.is_clustered = is_clustered;
        self
    }

    /// Same layout under another name (used for `<name>_new` copies).
    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn storage(&self) -> StorageClauses<'_> {
        StorageClauses {
            partition_by: self.partition_by.as_deref(),
            order_by: &self.order_by,
            ttl: self.ttl.as_deref(),
            settings: &self.settings,
        }
    }
}

/// Declarative description of a materialized view.
///
/// `query` refers to each entry of `sources` as a `{name}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    pub name: String,
    pub engine: Engine,
    pub order_by: Vec<String>,
    pub partition_by: Option<String>,
    pub settings: Vec<(String, String)>,
    pub query: String,
    pub sources: Vec<String>,
    /// Fill the view from existing source rows on creation
    pub populate: bool,
    pub distribution_hash: String,
    pub replicated_version: u32,
    pub is_clustered: bool,
}

impl ViewSpec {
    pub fn new(name: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            engine: Engine::AggregatingMergeTree,
            order_by: Vec::new(),
            partition_by: None,
            settings: Vec::new(),
            query: query.to_string(),
            sources: Vec::new(),
            populate: false,
            distribution_hash: DEFAULT_DISTRIBUTION_HASH.to_string(),
            replicated_version: 1,
            is_clustered: false,
        }
    }

    pub fn source(mut self, table: &str) -> Self {
        self.sources.push(table.to_string());
        self
    }

    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn order_by<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn partition_by(mut self, expr: &str) -> Self {
        self.partition_by = Some(expr.to_string());
        self
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.settings.push((key.to_string(), value.to_string()));
        self
    }

    pub fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    pub fn distribution_hash(mut self, expr: &str) -> Self {
        self.distribution_hash = expr.to_string();
        self
    }

    pub fn replicated_version(mut self, version: u32) -> Self {
        self.replicated_version = version;
        self
    }

    pub fn clustered(mut self, is_clustered: bool) -> Self {
        self.is_clustered = is_clustered;
        self
    }

    fn storage(&self) -> StorageClauses<'_> {
        StorageClauses {
            partition_by: self.partition_by.as_deref(),
            order_by: &self.order_by,
            ttl: None,
            settings: &self.settings,
        }
    }
}

/// Statements creating a table: one when standalone, two when clustered.
pub fn create_table(spec: &TableSpec) -> Result<Vec<String>> {
    let name = Ident::new(spec.name.as_str())
        .map_err(|e| Error::schema(format!("table name: {}", e)))?;

    if spec.columns.is_empty() {
        return Err(Error::schema(format!("table {} has no columns", spec.name)));
    }

    let mut body = spec
        .columns
        .iter()
        .map(ColumnDef::render)
        .collect::<Result<Vec<_>>>()?;
    for index in &spec.indices {
        body.push(index.render()?);
    }
    let body = body.join(",\n    ");
    let storage = spec.storage().render()?;

    if !spec.is_clustered {
        return Ok(vec![format!(
            "CREATE TABLE IF NOT EXISTS {}\n(\n    {}\n)\nENGINE = {}\n{}",
            name,
            body,
            spec.engine.render()?,
            storage
        )]);
    }

    Ok(vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} {}\n(\n    {}\n)\nENGINE = {}\n{}",
            replicated(&name),
            on_cluster(),
            body,
            spec.engine.render_replicated(spec.replicated_version)?,
            storage
        ),
        distributed_table(&name, &spec.distribution_hash)?,
    ])
}

/// Statements creating a materialized view: one when standalone, two when
/// clustered.
pub fn create_materialized_view(spec: &ViewSpec) -> Result<Vec<String>> {
    let name = Ident::new(spec.name.as_str())
        .map_err(|e| Error::schema(format!("view name: {}", e)))?;

    if spec.query.trim().is_empty() {
        return Err(Error::schema(format!("view {} has an empty query", spec.name)));
    }

    let query = resolve_sources(&spec.query, &spec.sources, spec.is_clustered)?;
    let storage = spec.storage().render()?;
    let populate = if spec.populate { "\nPOPULATE" } else { "" };

    if !spec.is_clustered {
        return Ok(vec![format!(
            "CREATE MATERIALIZED VIEW IF NOT EXISTS {}\nENGINE = {}\n{}{}\nAS {}",
            name,
            spec.engine.render()?,
            storage,
            populate,
            query.trim()
        )]);
    }

    Ok(vec![
        format!(
            "CREATE MATERIALIZED VIEW IF NOT EXISTS {} {}\nENGINE = {}\n{}{}\nAS {}",
            replicated(&name),
            on_cluster(),
            spec.engine.render_replicated(spec.replicated_version)?,
            storage,
            populate,
            query.trim()
        ),
        distributed_table(&name, &spec.distribution_hash)?,
    ])
}

/// Replace `{source}` placeholders with the physical name for the topology.
fn resolve_sources(query: &str, sources: &[String], is_clustered: bool) -> Result<String> {
    let mut resolved = query.to_string();

    for source in sources {
        let ident = Ident::new(source.as_str())?;
        let placeholder = format!("{{{}}}", source);
        if !resolved.contains(&placeholder) {
            return Err(Error::schema(format!(
                "view query does not reference source {}",
                placeholder
            )));
        }
        let physical = if is_clustered { replicated(&ident) } else { ident };
        resolved = resolved.replace(&placeholder, &physical.to_string());
    }

    Ok(resolved)
}

/// Distributed router over `<name>_replicated`.
fn distributed_table(name: &Ident, hash: &str) -> Result<String> {
    check_expr("distribution hash", hash)?;
    let local = replicated(name);
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} {} AS {}\nENGINE = Distributed({}, currentDatabase(), {}, {})",
        name,
        on_cluster(),
        local,
        literal(CLUSTER),
        local,
        hash
    ))
}

/// Apply the same ALTER actions to the physical objects of a table.
///
/// Clustered: the replicated table first, then the router. `router_actions`
/// differ from `actions` only where the router cannot take a clause.
fn alter(table: &str, actions: &str, router_actions: &str, is_clustered: bool) -> Result<Vec<String>> {
    let name = Ident::new(table)?;

    if !is_clustered {
        return Ok(vec![format!("ALTER TABLE {} {}", name, actions)]);
    }

    Ok(vec![
        format!("ALTER TABLE {} {} {}", replicated(&name), on_cluster(), actions),
        format!("ALTER TABLE {} {} {}", name, on_cluster(), router_actions),
    ])
}

/// `ADD COLUMN IF NOT EXISTS` for each column.
pub fn add_columns(table: &str, columns: &[ColumnDef], is_clustered: bool) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let render = |with_codec: bool| -> Result<String> {
        Ok(columns
            .iter()
            .map(|c| c.render_with(with_codec).map(|c| format!("ADD COLUMN IF NOT EXISTS {}", c)))
            .collect::<Result<Vec<_>>>()?
            .join(", "))
    };

    alter(table, &render(true)?, &render(false)?, is_clustered)
}

/// `DROP COLUMN IF EXISTS` for each column.
pub fn drop_columns(table: &str, columns: &[&str], is_clustered: bool) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let actions = columns
        .iter()
        .map(|c| Ident::new(*c).map(|c| format!("DROP COLUMN IF EXISTS {}", c)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    alter(table, &actions, &actions, is_clustered)
}

/// Rename a table: replicated object then router when clustered.
pub fn rename_table(from: &str, to: &str, is_clustered: bool) -> Result<Vec<String>> {
    let from = Ident::new(from)?;
    let to = Ident::new(to)?;

    if !is_clustered {
        return Ok(vec![format!("RENAME TABLE {} TO {}", from, to)]);
    }

    Ok(vec![
        format!(
            "RENAME TABLE {} TO {} {}",
            replicated(&from),
            replicated(&to),
            on_cluster()
        ),
        format!("RENAME TABLE {} TO {} {}", from, to, on_cluster()),
    ])
}

/// Drop a table: router then replicated object when clustered.
pub fn drop_table(name: &str, is_clustered: bool) -> Result<Vec<String>> {
    let name = Ident::new(name)?;

    if !is_clustered {
        return Ok(vec![format!("DROP TABLE IF EXISTS {}", name)]);
    }

    Ok(vec![
        format!("DROP TABLE IF EXISTS {} {} SYNC", name, on_cluster()),
        format!(
            "DROP TABLE IF EXISTS {} {} SYNC",
            replicated(&name),
            on_cluster()
        ),
    ])
}

/// Point the router `<name>` at `<name>_replicated` again.
///
/// A router keeps the local table name it was created with, so after a
/// clustered rename swap both routers must be rebuilt. No-op when standalone.
pub fn recreate_router(name: &str, hash: &str, is_clustered: bool) -> Result<Vec<String>> {
    if !is_clustered {
        return Ok(Vec::new());
    }

    let name = Ident::new(name)?;
    Ok(vec![
        format!("DROP TABLE IF EXISTS {} {} SYNC", name, on_cluster()),
        distributed_table(&name, hash)?,
    ])
}
