use anyhow::{Context, Result};
use clap::Parser;
use class_usage_finder::checker::UsageChecker;
use class_usage_finder::cli::{Cli, OutputFormat};
use class_usage_finder::config::ScanConfig;
use class_usage_finder::progress::{LogProgress, ScanStats};
use class_usage_finder::query::Query;
use class_usage_finder::report::Report;
use class_usage_finder::scan::expand_inputs;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let queries = parse_queries(&cli.queries)?;
    let inputs = expand_inputs(&cli.paths)?;
    let config = ScanConfig::new(inputs, queries, cli.threads, cli.class_workers)?;

    let start = Instant::now();
    let queries = config.queries().to_vec();
    let outcome = UsageChecker::with_observer(config, Arc::new(LogProgress)).run()?;

    let result = ScanResult {
        queries,
        reports: outcome.reports,
        stats: outcome.stats,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    write_scan_output(&result, cli.format, cli.output.as_deref())
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn parse_queries(raw: &[String]) -> Result<Vec<Query>> {
    raw.iter()
        .map(|q| {
            q.parse::<Query>()
                .with_context(|| format!("invalid query {q:?}"))
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ScanResult {
    queries: Vec<Query>,
    reports: Vec<Report>,
    stats: ScanStats,
    duration_ms: u64,
}

fn render_text(result: &ScanResult) -> String {
    let mut out = String::new();
    for query in &result.queries {
        out.push_str(&format!("Query: {query}\n"));
    }
    for report in &result.reports {
        out.push_str(&format!("-  {report}\n"));
    }
    out
}

fn write_scan_output(result: &ScanResult, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => render_text(result),
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.is_empty() && !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use class_usage_finder::location::ClassLocation;
    use class_usage_finder::query::StringCheck;

    fn sample() -> ScanResult {
        let query = Query::Method {
            owner: StringCheck::exact("util.List"),
            name: StringCheck::contains_word("add"),
            descriptor: StringCheck::any(),
        };
        let location = ClassLocation::new("lib.jar", "a.B")
            .in_method("m", "()V")
            .in_code(Some(11));
        ScanResult {
            queries: vec![query.clone()],
            reports: vec![Report::new(location, query)],
            stats: ScanStats::default(),
            duration_ms: 3,
        }
    }

    #[test]
    fn text_output_lists_queries_then_reports() {
        assert_eq!(
            render_text(&sample()),
            "Query: method:owner=[e]util.List;name=[w]add\n\
             -  usage at file lib.jar in class a.B in method m (()V) on line 11 \
             from query method:owner=[e]util.List;name=[w]add\n"
        );
    }

    #[test]
    fn parse_queries_reports_the_offending_query() {
        let err = parse_queries(&["class:name=Foo".into(), "bogus".into()]).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn writes_output_file_creating_parents() {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "class-usage-out-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let path = dir.join("nested/report.json");

        write_scan_output(&sample(), OutputFormat::Json, Some(&path)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["duration_ms"], 3);
        assert_eq!(value["reports"][0]["location"]["scope"], "code");
        assert_eq!(value["reports"][0]["location"]["line"], 11);
        let _ = std::fs::remove_dir_all(dir);
    }
}
