//! Static declarations of every known measurement, its retention policy and
//! its downsampling continuous queries.
//!
//! Storage layout: high-frequency data lives in `rp_days_14`, downsampled
//! into `rp_days_90` (6h groups) and then `rp_inf` (1w groups). Low-frequency
//! data starts in `rp_days_90`. Data that cannot be meaningfully aggregated
//! is kept for half a year or a year.
//!
//! Field lists of the continuous queries are spelled out per table because
//! `mean(*)` renames every column, which breaks dashboards.

use crate::database::Database;
use crate::datatype::Datatype;
use crate::queries::ContinuousQueryTemplate;
use crate::retention::RetentionPolicy;
use crate::table::Table;
use crate::Result;

fn rp_autogen(db: &str) -> Result<RetentionPolicy> {
    // leave at INF to not lose data that lands here by accident
    RetentionPolicy::new("autogen", db, "INF", 1, "0s", false)
}

fn rp_inf(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_inf", db, "INF", 1, "0s", false)
}

fn rp_year(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_year", db, "56w", 1, "0s", false)
}

fn rp_half_year(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_half_year", db, "28w", 1, "0s", false)
}

fn rp_days_90(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_days_90", db, "90d", 1, "0s", false)
}

fn rp_days_14(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_days_14", db, "14d", 1, "0s", true)
}

fn rp_days_7(db: &str) -> Result<RetentionPolicy> {
    RetentionPolicy::new("rp_days_7", db, "7d", 1, "0s", false)
}

struct TableDef<'a> {
    name: &'a str,
    fields: &'a [(&'a str, Datatype)],
    tags: &'a [&'a str],
    time_key: Option<&'a str>,
    retention_policy: RetentionPolicy,
    continuous_queries: Vec<ContinuousQueryTemplate>,
}

fn add_predef_table(database: &mut Database, def: TableDef<'_>) -> Result<()> {
    database.add_retention_policy(def.retention_policy.clone());

    let fields = def
        .fields
        .iter()
        .map(|(name, datatype)| (name.to_string(), *datatype))
        .collect();
    let tags = def.tags.iter().map(|tag| tag.to_string()).collect();
    let table = Table::new(
        database.name(),
        def.name,
        fields,
        tags,
        def.time_key,
        def.retention_policy,
    )?;
    let table = database.add_table(table);

    for (i, template) in def.continuous_queries.iter().enumerate() {
        let query = template.resolve(&table, &format!("cq_{}_{}", table.name(), i))?;
        database.add_retention_policy(template.target_policy().clone());
        database.add_continuous_query(query);
    }
    Ok(())
}

/// Declares every table, retention policy and continuous query on the
/// given database. Call once before using the database for lookups.
#[allow(clippy::too_many_lines)]
pub fn add_table_definitions(database: &mut Database) -> Result<()> {
    let db = database.name().to_string();

    // make the unused policies known too, so the reconciler creates them
    database.add_retention_policy(rp_autogen(&db)?);
    database.add_retention_policy(rp_year(&db)?);
    database.add_retention_policy(rp_days_7(&db)?);

    // ################## job tables ##############################

    add_predef_table(
        database,
        TableDef {
            name: "jobs",
            fields: &[
                ("duration", Datatype::Int),
                ("start", Datatype::Timestamp),
                ("end", Datatype::Timestamp),
                ("jobLogsCount", Datatype::Int),
                // high-cardinality, kept as field rather than tag
                ("id", Datatype::Int),
                ("numTasks", Datatype::Int),
                ("percent", Datatype::Float),
            ],
            tags: &[
                "jobId",
                "status",
                "indexStatus",
                "jobName",
                "subPolicyType",
                "type",
                "jobsLogsStored",
            ],
            time_key: Some("start"),
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &[
                    r#"mean("duration") as "duration""#,
                    "sum(jobLogsCount) as jobLogsCount",
                    "mean(numTasks) as numTasks",
                    r#"mean("percent") as "percent""#,
                    r#"count(id) as "count""#,
                ],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "jobs_statistics",
            fields: &[
                ("total", Datatype::Int),
                ("success", Datatype::Int),
                ("failed", Datatype::Int),
                ("skipped", Datatype::Int),
                ("id", Datatype::Int),
            ],
            tags: &[
                "resourceType",
                "jobId",
                "status",
                "indexStatus",
                "jobName",
                "type",
                "subPolicyType",
            ],
            time_key: Some("start"),
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &[
                    r#"mean("total") as "total""#,
                    r#"mean("success") as "success""#,
                    r#"mean("failed") as "failed""#,
                    r#"mean("skipped") as "skipped""#,
                    r#"count(id) as "count""#,
                ],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "jobLogs",
            fields: &[
                ("jobLogId", Datatype::String),
                ("jobSessionId", Datatype::Int),
                ("messageParams", Datatype::String),
                ("message", Datatype::String),
                ("jobExecutionTime", Datatype::Timestamp),
            ],
            tags: &["type", "messageId", "jobName", "jobId"],
            time_key: Some("logTime"),
            retention_policy: rp_half_year(&db)?,
            continuous_queries: vec![],
        },
    )?;

    // ############# self-monitoring tables ########################

    add_predef_table(
        database,
        TableDef {
            name: "influx_metrics",
            fields: &[
                ("duration_ms", Datatype::Float),
                ("item_count", Datatype::Int),
            ],
            tags: &["keyword", "tableName"],
            time_key: Some("time"),
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(duration_ms) as duration_ms",
                        "mean(item_count) as item_count",
                        "STDDEV(*)",
                    ],
                    rp_days_90(&db)?,
                    "6h",
                ),
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(duration_ms) as duration_ms",
                        "mean(item_count) as item_count",
                        "STDDEV(*)",
                    ],
                    rp_inf(&db)?,
                    "1w",
                ),
            ],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "sshCmdResponse",
            fields: &[("output", Datatype::String)],
            tags: &["command", "host", "ssh_type"],
            time_key: None,
            retention_policy: rp_half_year(&db)?,
            continuous_queries: vec![],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "backmon_metrics",
            fields: &[
                ("duration", Datatype::Int),
                ("errorCount", Datatype::Int),
                ("errorMessages", Datatype::String),
            ],
            tags: &[
                "backmon_version",
                "influxdb_version",
                "server_version",
                "vms",
                "server_build",
                "all",
                "confFileJSON",
                "jobLogs",
                "jobs",
                "siteStats",
                "slaStats",
                "ssh",
                "verbose",
                "vmStats",
                "vsnapInfo",
                "constant",
                "daily",
                "type",
                "minimumLogs",
                "debug",
                "storages",
                "sites",
                "servercatalog",
                "cpu",
                "hourly",
                "transfer_data",
                "old_database",
                "create_dashboard",
                "dashboard_folder_path",
                "loadedSystem",
                "processStats",
                "copy_database",
                "test",
            ],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                // errorMessages is dropped on downsampling, strings do not aggregate
                ContinuousQueryTemplate::downsample(
                    &[
                        r#"mean("duration") as "duration""#,
                        "sum(errorCount) as sum_errorCount",
                    ],
                    rp_days_90(&db)?,
                    "6h",
                ),
                ContinuousQueryTemplate::downsample(
                    &[
                        r#"mean("duration") as "duration""#,
                        "sum(errorCount) as sum_errorCount",
                    ],
                    rp_inf(&db)?,
                    "1w",
                ),
            ],
        },
    )?;

    // ############### vm and sla tables ##########################

    add_predef_table(
        database,
        TableDef {
            name: "slaStats",
            fields: &[("vmCountBySLA", Datatype::Int)],
            tags: &["slaId", "slaName"],
            time_key: None,
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &["mean(vmCountBySLA) as vmCountBySLA"],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    let vms_group_tags = [
        "host",
        "vmVersion",
        "osName",
        "isProtected",
        "inHLO",
        "isEncrypted",
        "datacenterName",
        // id excluded to keep the grouping meaningful
        "hypervisorType",
    ];
    let vms_means = [
        "mean(commited) as commited",
        "mean(uncommited) as uncommited",
        "mean(shared) as shared",
        "mean(cpu) as cpu",
        "mean(coresPerCpu) as coresPerCpu",
        "mean(memory) as memory",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "vms",
            fields: &[
                ("uptime", Datatype::Timestamp),
                ("powerState", Datatype::String),
                ("commited", Datatype::Int),
                ("uncommited", Datatype::Int),
                ("shared", Datatype::Int),
                ("cpu", Datatype::Int),
                ("coresPerCpu", Datatype::Int),
                ("memory", Datatype::Int),
                ("name", Datatype::String),
            ],
            tags: &[
                "host",
                "vmVersion",
                "osName",
                "isProtected",
                "inHLO",
                "isEncrypted",
                "datacenterName",
                // id as tag to keep the tag set unique
                "id",
                "hypervisorType",
            ],
            time_key: Some("catalogTime"),
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&vms_means, rp_days_90(&db)?, "6h")
                    .with_group_args(&vms_group_tags),
                ContinuousQueryTemplate::downsample(&vms_means, rp_inf(&db)?, "1w")
                    .with_group_args(&vms_group_tags),
            ],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "vmStats",
            fields: &[
                ("vmCount", Datatype::Int),
                ("vmMaxSize", Datatype::Int),
                ("vmMinSize", Datatype::Int),
                ("vmSizeTotal", Datatype::Int),
                ("vmAvgSize", Datatype::Float),
                ("vmMaxUptime", Datatype::Int),
                ("vmMinUptime", Datatype::Int),
                ("vmUptimeTotal", Datatype::Int),
                ("vmAvgUptime", Datatype::Float),
                ("vmCountProtected", Datatype::Int),
                ("vmCountUnprotected", Datatype::Int),
                ("vmCountEncrypted", Datatype::Int),
                ("vmCountPlain", Datatype::Int),
                ("vmCountHLO", Datatype::Int),
                ("vmCountNotHLO", Datatype::Int),
                ("vmCountHyperV", Datatype::Int),
                ("vmCountVMware", Datatype::Int),
                ("nrDataCenters", Datatype::Int),
                ("nrHosts", Datatype::Int),
            ],
            tags: &[],
            time_key: Some("time"),
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &[
                    "mean(vmCount) as vmCount",
                    "mean(vmMaxSize) as vmMaxSize",
                    "mean(vmMinSize) as vmMinSize",
                    "mean(vmSizeTotal) as vmSizeTotal",
                    "mean(vmAvgSize) as vmAvgSize",
                    "mean(vmMaxUptime) as vmMaxUptime",
                    "mean(vmMinUptime) as vmMinUptime",
                    "mean(vmUptimeTotal) as vmUptimeTotal",
                    "mean(vmAvgUptime) as vmAvgUptime",
                    "mean(vmCountProtected) as vmCountProtected",
                    "mean(vmCountUnprotected) as vmCountUnprotected",
                    "mean(vmCountEncrypted) as vmCountEncrypted",
                    "mean(vmCountPlain) as vmCountPlain",
                    "mean(vmCountHLO) as vmCountHLO",
                    "mean(vmCountNotHLO) as vmCountNotHLO",
                    "mean(vmCountHyperV) as vmCountHyperV",
                    "mean(vmCountVMware) as vmCountVMware",
                    "mean(nrDataCenters) as nrDataCenters",
                    "mean(nrHosts) as nrHosts",
                ],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "vmBackupSummary",
            fields: &[
                ("transferredBytes", Datatype::Int),
                ("throughputBytes/s", Datatype::Int),
                ("queueTimeSec", Datatype::Int),
                ("protectedVMDKs", Datatype::Int),
                ("TotalVMDKs", Datatype::Int),
                ("name", Datatype::String),
            ],
            tags: &[
                "proxy",
                "vsnaps",
                "type",
                "transportType",
                "status",
                "messageId",
            ],
            time_key: Some("time"),
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &[
                        r#"mean("throughputBytes/s") as "throughputBytes/s""#,
                        "mean(queueTimeSec) as queueTimeSec",
                        "sum(transferredBytes) as sum_transferredBytes",
                        "sum(protectedVMDKs) as sum_protectedVMDKs",
                        "sum(TotalVMDKs) as sum_TotalVMDKs",
                    ],
                    rp_days_90(&db)?,
                    "6h",
                ),
                ContinuousQueryTemplate::downsample(
                    &[
                        r#"mean("throughputBytes/s") as "throughputBytes/s""#,
                        "mean(queueTimeSec) as queueTimeSec",
                        "sum(transferredBytes) as sum_transferredBytes",
                        "sum(protectedVMDKs) as sum_protectedVMDKs",
                        "sum(TotalVMDKs) as sum_TotalVMDKs",
                    ],
                    rp_inf(&db)?,
                    "1w",
                ),
            ],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "vmReplicateSummary",
            fields: &[
                ("total", Datatype::Int),
                ("failed", Datatype::Int),
                ("duration", Datatype::Int),
            ],
            tags: &[],
            time_key: Some("time"),
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &[
                    r#"mean("duration") as "duration""#,
                    "sum(total) as sum_total",
                    "sum(failed) as sum_failed",
                ],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "vmReplicateStats",
            fields: &[
                ("replicatedBytes", Datatype::Int),
                ("throughputBytes/sec", Datatype::Int),
                ("duration", Datatype::Int),
            ],
            tags: &[],
            time_key: Some("time"),
            retention_policy: rp_days_90(&db)?,
            continuous_queries: vec![ContinuousQueryTemplate::downsample(
                &[
                    r#"mean("throughputBytes/sec") as "throughputBytes/sec""#,
                    "sum(replicatedBytes) as replicatedBytes",
                    r#"mean("duration") as "duration""#,
                ],
                rp_inf(&db)?,
                "1w",
            )],
        },
    )?;

    // ############### vadp and vsnap tables ##########################

    add_predef_table(
        database,
        TableDef {
            name: "vadps",
            fields: &[
                ("state", Datatype::String),
                ("vadpName", Datatype::String),
                ("vadpId", Datatype::Int),
                ("ipAddr", Datatype::String),
            ],
            tags: &["siteId", "siteName", "version"],
            time_key: None,
            retention_policy: rp_half_year(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as enabled_count"],
                    rp_days_14(&db)?,
                    "1h",
                )
                .with_where(r#"("state" =~ /ENABLED/)"#),
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as disabled_count"],
                    rp_days_14(&db)?,
                    "1h",
                )
                .with_where(r#"("state" !~ /ENABLED/)"#),
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as enabled_count"],
                    rp_days_90(&db)?,
                    "6h",
                )
                .with_where(r#"("state" =~ /ENABLED/)"#),
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as disabled_count"],
                    rp_days_90(&db)?,
                    "6h",
                )
                .with_where(r#"("state" !~ /ENABLED/)"#),
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as enabled_count"],
                    rp_inf(&db)?,
                    "1w",
                )
                .with_where(r#"("state" =~ /ENABLED/)"#),
                ContinuousQueryTemplate::downsample(
                    &["count(distinct(vadpId)) as disabled_count"],
                    rp_inf(&db)?,
                    "1w",
                )
                .with_where(r#"("state" !~ /ENABLED/)"#),
            ],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "storages",
            fields: &[
                ("free", Datatype::Int),
                ("pct_free", Datatype::Float),
                ("pct_used", Datatype::Float),
                ("total", Datatype::Int),
                ("used", Datatype::Int),
                ("name", Datatype::String),
            ],
            tags: &[
                "isReady",
                "site",
                "siteName",
                "storageId",
                "type",
                "version",
                "hostAddress",
            ],
            time_key: Some("updateTime"),
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(free) as free",
                        "mean(pct_free) as pct_free",
                        "mean(pct_used) as pct_used",
                        "mean(total) as total",
                        "mean(used) as used",
                    ],
                    rp_days_90(&db)?,
                    "6h",
                ),
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(free) as free",
                        "mean(pct_free) as pct_free",
                        "mean(pct_used) as pct_used",
                        "mean(total) as total",
                        "mean(used) as used",
                    ],
                    rp_inf(&db)?,
                    "1w",
                ),
            ],
        },
    )?;

    let vsnap_pool_means = [
        "mean(compression_ratio) as compression_ratio",
        "mean(deduplication_ratio) as deduplication_ratio",
        "mean(diskgroup_size) as diskgroup_size",
        "mean(health) as health",
        "mean(size_before_compression) as size_before_compression",
        "mean(size_before_deduplication) as size_before_deduplication",
        "mean(size_free) as size_free",
        "mean(size_total) as size_total",
        "mean(size_used) as size_used",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "vsnap_pools",
            fields: &[
                ("compression_ratio", Datatype::Float),
                ("deduplication_ratio", Datatype::Float),
                ("diskgroup_size", Datatype::Int),
                ("health", Datatype::Int),
                ("size_before_compression", Datatype::Int),
                ("size_before_deduplication", Datatype::Int),
                ("size_free", Datatype::Int),
                ("size_total", Datatype::Int),
                ("size_used", Datatype::Int),
            ],
            tags: &[
                "encryption_enabled",
                "compression",
                "deduplication",
                "id",
                "name",
                "pool_type",
                "status",
                "hostName",
                "ssh_type",
            ],
            // updateTime is not refreshed on the source side, capture time it is
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&vsnap_pool_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&vsnap_pool_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    let vsnap_stats_means = [
        "mean(size_arc_max) as size_arc_max",
        "mean(size_arc_used) as size_arc_used",
        "mean(size_ddt_core) as size_ddt_core",
        "mean(size_ddt_disk) as size_ddt_disk",
        "mean(size_zfs_arc_meta_max) as size_zfs_arc_meta_max",
        "mean(size_zfs_arc_meta_used) as size_zfs_arc_meta_used",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "vsnap_system_stats",
            fields: &[
                ("size_arc_max", Datatype::Int),
                ("size_arc_used", Datatype::Int),
                ("size_ddt_core", Datatype::Int),
                ("size_ddt_disk", Datatype::Int),
                ("size_zfs_arc_meta_max", Datatype::Int),
                ("size_zfs_arc_meta_used", Datatype::Int),
            ],
            tags: &["hostName", "ssh_type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&vsnap_stats_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&vsnap_stats_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    // ############# server system stats #####################

    let cpuram_means = [
        "mean(cpuUtil) as cpuUtil",
        "mean(memorySize) as memorySize",
        "mean(memoryUtil) as memoryUtil",
        "mean(dataSize) as dataSize",
        "mean(dataUtil) as dataUtil",
        "mean(data2Size) as data2Size",
        "mean(data2Util) as data2Util",
        "mean(data3Size) as data3Size",
        "mean(data3Util) as data3Util",
        "STDDEV(*)",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "cpuram",
            fields: &[
                ("cpuUtil", Datatype::Float),
                ("memorySize", Datatype::Int),
                ("memoryUtil", Datatype::Float),
                ("dataSize", Datatype::Int),
                ("dataUtil", Datatype::Float),
                ("data2Size", Datatype::Int),
                ("data2Util", Datatype::Float),
                ("data3Size", Datatype::Int),
                ("data3Util", Datatype::Float),
            ],
            tags: &[],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&cpuram_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&cpuram_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "sites",
            fields: &[
                ("throttleRates", Datatype::String),
                ("description", Datatype::String),
            ],
            tags: &["siteId", "siteName"],
            time_key: None,
            retention_policy: rp_half_year(&db)?,
            continuous_queries: vec![],
        },
    )?;

    add_predef_table(
        database,
        TableDef {
            name: "servercatalog",
            fields: &[
                ("totalSize", Datatype::Int),
                ("usedSize", Datatype::Int),
                ("availableSize", Datatype::Int),
                ("percentUsed", Datatype::Float),
                ("status", Datatype::String),
            ],
            tags: &["name", "type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(totalSize) as totalSize",
                        "mean(usedSize) as usedSize",
                        "mean(availableSize) as availableSize",
                        "mean(percentUsed) as percentUsed",
                    ],
                    rp_days_90(&db)?,
                    "6h",
                ),
                ContinuousQueryTemplate::downsample(
                    &[
                        "mean(totalSize) as totalSize",
                        "mean(usedSize) as usedSize",
                        "mean(availableSize) as availableSize",
                        "mean(percentUsed) as percentUsed",
                    ],
                    rp_inf(&db)?,
                    "1w",
                ),
            ],
        },
    )?;

    let process_means = [
        r#"mean("%CPU") as "%CPU""#,
        r#"mean("%MEM") as "%MEM""#,
        "mean(RES) as RES",
        "mean(SHR) as SHR",
        r#"mean("TIME+") as "TIME+""#,
        "mean(VIRT) as VIRT",
        "mean(MEM_ABS) as MEM_ABS",
        r#"STDDEV("%CPU") as "sttdev_%CPU""#,
        r#"STDDEV("%MEM") as "sttdev_%MEM""#,
    ];
    add_predef_table(
        database,
        TableDef {
            name: "processStats",
            fields: &[
                ("%CPU", Datatype::Float),
                ("%MEM", Datatype::Float),
                ("TIME+", Datatype::Int),
                ("VIRT", Datatype::Int),
                ("MEM_ABS", Datatype::Int),
            ],
            tags: &["COMMAND", "PID", "USER", "hostName", "ssh_type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&process_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&process_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    let mpstat_means = [
        r#"mean("%usr") as "%usr""#,
        r#"mean("%nice") as "%nice""#,
        r#"mean("%sys") as "%sys""#,
        r#"mean("%iowait") as "%iowait""#,
        r#"mean("%irq") as "%irq""#,
        r#"mean("%soft") as "%soft""#,
        r#"mean("%steal") as "%steal""#,
        r#"mean("%guest") as "%guest""#,
        r#"mean("%gnice") as "%gnice""#,
        r#"mean("%idle") as "%idle""#,
        "mean(cpu_count) as cpu_count",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "ssh_mpstat_cmd",
            fields: &[
                ("%usr", Datatype::Float),
                ("%nice", Datatype::Float),
                ("%sys", Datatype::Float),
                ("%iowait", Datatype::Float),
                ("%irq", Datatype::Float),
                ("%soft", Datatype::Float),
                ("%steal", Datatype::Float),
                ("%guest", Datatype::Float),
                ("%gnice", Datatype::Float),
                ("%idle", Datatype::Float),
                ("cpu_count", Datatype::Int),
            ],
            tags: &["CPU", "name", "host", "system_type", "hostName", "ssh_type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&mpstat_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&mpstat_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    let free_means = [
        r#"mean("buff/cache") as "buff/cache""#,
        "mean(free) as free",
        "mean(shared) as shared",
        "mean(total) as total",
        "mean(used) as used",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "ssh_free_cmd",
            fields: &[
                ("buff/cache", Datatype::Int),
                ("free", Datatype::Int),
                ("shared", Datatype::Int),
                ("total", Datatype::Int),
                ("used", Datatype::Int),
            ],
            tags: &["name", "hostName", "ssh_type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&free_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&free_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    let df_means = [
        r#"mean("Use%") as "Use%""#,
        "mean(Available) as Available",
        "mean(Used) as Used",
        "mean(Size) as Size",
    ];
    add_predef_table(
        database,
        TableDef {
            name: "df_ssh",
            fields: &[
                ("Size", Datatype::Int),
                ("Used", Datatype::Int),
                ("Available", Datatype::Int),
                ("Use%", Datatype::Int),
            ],
            tags: &["Filesystem", "Mounted", "hostName", "ssh_type"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&df_means, rp_days_90(&db)?, "6h"),
                ContinuousQueryTemplate::downsample(&df_means, rp_inf(&db)?, "1w"),
            ],
        },
    )?;

    // ################# office365 tables ############################

    let office_sums = [
        "sum(protectedItems) as sum_protectedItems",
        "sum(selectedItems) as sum_selectedItems",
        "sum(imported365Users) as sum_imported365Users",
    ];
    // jobSessionId is dropped on downsampling
    let office_group_tags = ["jobId", "jobName", "ssh_type"];
    add_predef_table(
        database,
        TableDef {
            name: "office365Stats",
            fields: &[
                ("protectedItems", Datatype::Int),
                ("selectedItems", Datatype::Int),
                ("imported365Users", Datatype::Int),
            ],
            tags: &["jobId", "jobName", "ssh_type", "jobSessionId"],
            time_key: Some("jobExecutionTime"),
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(&office_sums, rp_days_90(&db)?, "6h")
                    .with_group_args(&office_group_tags),
                ContinuousQueryTemplate::downsample(&office_sums, rp_inf(&db)?, "1w")
                    .with_group_args(&office_group_tags),
            ],
        },
    )?;

    let transf_group_tags = ["itemType", "jobId", "jobName", "serverName"];
    add_predef_table(
        database,
        TableDef {
            name: "office365TransfBytes",
            fields: &[
                ("itemName", Datatype::String),
                ("transferredBytes", Datatype::Int),
            ],
            tags: &["itemType", "serverName", "jobId", "jobName", "jobSessionId"],
            time_key: None,
            retention_policy: rp_days_14(&db)?,
            continuous_queries: vec![
                ContinuousQueryTemplate::downsample(
                    &["sum(transferredBytes) as transferredBytes"],
                    rp_days_90(&db)?,
                    "6h",
                )
                .with_group_args(&transf_group_tags),
                ContinuousQueryTemplate::downsample(
                    &["sum(transferredBytes) as transferredBytes"],
                    rp_inf(&db)?,
                    "1w",
                )
                .with_group_args(&transf_group_tags),
            ],
        },
    )?;

    Ok(())
}
