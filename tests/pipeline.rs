mod common;

use std::sync::{Arc, Mutex};

use class_usage_finder::checker::UsageChecker;
use class_usage_finder::config::ScanConfig;
use class_usage_finder::progress::{ProgressObserver, ScanState};
use class_usage_finder::query::Query;
use common::*;

fn query(text: &str) -> Query {
    text.parse().unwrap()
}

#[derive(Default)]
struct RecordingObserver {
    states: Mutex<Vec<ScanState>>,
    archives: Mutex<Vec<usize>>,
    classes: Mutex<Vec<usize>>,
}

impl ProgressObserver for RecordingObserver {
    fn state_changed(&self, state: ScanState) {
        self.states.lock().unwrap().push(state);
    }

    fn archives_opened(&self, count: usize) {
        self.archives.lock().unwrap().push(count);
    }

    fn classes_checked(&self, count: usize) {
        self.classes.lock().unwrap().push(count);
    }
}

#[test]
fn finds_the_interface_call_in_lib_jar() -> anyhow::Result<()> {
    let jar = temp_path("usage_pipeline_lib", "jar");
    write_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("a/B.class", &class_calling_list_add()),
        ],
    )?;

    let config = ScanConfig::new(
        vec![jar.clone()],
        vec![query("method:owner=\"util.List\";name=\"add\"")],
        1,
        4,
    )?;
    let outcome = UsageChecker::new(config).run()?;

    assert_eq!(outcome.reports.len(), 1);
    let location = &outcome.reports[0].location;
    assert_eq!(&*location.class().class_name, "a.B");
    assert_eq!(&*location.class().archive, jar.to_string_lossy());
    let method = location.method().expect("code location");
    assert_eq!(&*method.method_name, "m");
    assert_eq!(&*method.descriptor, "()V");
    assert_eq!(location.line(), Some(11));

    assert_eq!(outcome.stats.total_archives, 1);
    assert_eq!(outcome.stats.archives_opened, 1);
    assert_eq!(outcome.stats.total_classes, 1);
    assert_eq!(outcome.stats.classes_checked, 1);
    assert_eq!(outcome.stats.reports, 1);

    let _ = std::fs::remove_file(&jar);
    Ok(())
}

#[test]
fn malformed_entries_are_counted_and_skipped() -> anyhow::Result<()> {
    let jar = temp_path("usage_pipeline_malformed", "jar");
    let good = class_calling_list_add();
    write_jar(
        &jar,
        &[
            ("a/B.class", &good),
            ("broken/NotAClass.class", b"not a class file"),
            ("broken/Truncated.class", &good[..good.len() / 2]),
        ],
    )?;

    let config = ScanConfig::new(vec![jar.clone()], vec![query("class:name=[e]util.List")], 1, 2)?;
    let outcome = UsageChecker::new(config).run()?;

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.stats.total_classes, 3);
    assert_eq!(outcome.stats.classes_checked, 3);
    assert_eq!(outcome.stats.class_format_failures, 2);
    assert_eq!(outcome.stats.entry_read_failures, 0);

    let _ = std::fs::remove_file(&jar);
    Ok(())
}

#[test]
fn unreadable_archives_do_not_stop_the_scan() -> anyhow::Result<()> {
    let broken = temp_path("usage_pipeline_broken", "jar");
    std::fs::write(&broken, b"PK but not really")?;
    let jar = temp_path("usage_pipeline_ok", "jar");
    write_jar(&jar, &[("a/B.class", &class_calling_list_add())])?;

    let observer = Arc::new(RecordingObserver::default());
    let config = ScanConfig::new(
        vec![broken.clone(), jar.clone()],
        vec![query("m:n=[e]add"), query("c:n=[w]List")],
        2,
        4,
    )?;
    let outcome = UsageChecker::with_observer(config, observer.clone()).run()?;

    // One method report and one owner-class report from the same instruction.
    assert_eq!(outcome.reports.len(), 2);
    assert_eq!(outcome.stats.archives_opened, 2);
    assert_eq!(outcome.stats.archive_failures, 1);
    assert_eq!(outcome.stats.total_classes, 1);

    assert_eq!(
        *observer.states.lock().unwrap(),
        [
            ScanState::OpeningArchives,
            ScanState::CheckingClasses,
            ScanState::Stopped
        ]
    );
    let mut archives = observer.archives.lock().unwrap().clone();
    archives.sort();
    assert_eq!(archives, [1, 2]);
    assert_eq!(*observer.classes.lock().unwrap(), [1]);

    let _ = std::fs::remove_file(&broken);
    let _ = std::fs::remove_file(&jar);
    Ok(())
}

#[test]
fn every_class_of_every_archive_is_checked_once() -> anyhow::Result<()> {
    let class = class_calling_list_add();
    let jars: Vec<_> = (0..6)
        .map(|_| temp_path("usage_pipeline_many", "jar"))
        .collect();
    for jar in &jars {
        write_jar(
            jar,
            &[
                ("a/B.class", &class),
                ("a/C.class", &class),
                ("a/D.class", &class),
            ],
        )?;
    }

    let config = ScanConfig::new(jars.clone(), vec![query("method:name=[e]add")], 3, 4)?;
    let outcome = UsageChecker::new(config).run()?;

    assert_eq!(outcome.stats.total_classes, 18);
    assert_eq!(outcome.stats.classes_checked, 18);
    assert_eq!(outcome.reports.len(), 18);
    for jar in &jars {
        let name = jar.to_string_lossy();
        let hits = outcome
            .reports
            .iter()
            .filter(|r| *r.location.class().archive == *name)
            .count();
        assert_eq!(hits, 3);
        let _ = std::fs::remove_file(jar);
    }
    Ok(())
}
