mod common;

use common::{fixture, init_test_logging, proc_root_with};
use proptest::prelude::*;
use tracing::info;
use vigil_common::Reading;
use vigil_telemetry::{CpuLoadSensor, CpuStats, Sensor};

#[test]
fn test_parse_proc_stat_fixture() {
    init_test_logging();
    info!(test = "test_parse_proc_stat_fixture", phase = "setup");

    let stats = CpuStats::parse(fixture("proc_stat_first.txt")).expect("stat parse");

    info!(
        test = "test_parse_proc_stat_fixture",
        phase = "assert",
        total = stats.total(),
        busy = stats.busy()
    );
    assert_eq!(stats.user, 4705);
    assert_eq!(stats.idle, 3699176);
    assert_eq!(stats.total(), 3704867);
    assert_eq!(stats.busy(), 5668);

    info!(
        test = "test_parse_proc_stat_fixture",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_busy_fraction_between_samples() {
    init_test_logging();
    info!(test = "test_busy_fraction_between_samples", phase = "setup");

    let prev = CpuStats::parse(fixture("proc_stat_first.txt")).expect("stat parse");
    let curr = CpuStats::parse(fixture("proc_stat_second.txt")).expect("stat parse");

    let fraction = CpuStats::busy_fraction(&prev, &curr);
    info!(
        test = "test_busy_fraction_between_samples",
        phase = "assert",
        fraction
    );
    assert!((fraction - 0.8).abs() < 1e-9, "got {fraction}");

    info!(
        test = "test_busy_fraction_between_samples",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_sensor_first_read_measures_since_boot() {
    init_test_logging();
    info!(test = "test_sensor_first_read_measures_since_boot", phase = "setup");

    let root = proc_root_with("stat", "proc_stat_first.txt");
    let mut sensor = CpuLoadSensor::with_proc_root(root.path());

    info!(test = "test_sensor_first_read_measures_since_boot", phase = "execute");
    let first: Reading = sensor.read();
    std::fs::write(root.path().join("stat"), fixture("proc_stat_second.txt")).expect("rewrite");
    let second = sensor.read();

    info!(
        test = "test_sensor_first_read_measures_since_boot",
        phase = "assert",
        first = first.value,
        second = second.value
    );
    assert_eq!(first.sensor_id, "cpu_load");
    assert!(first.valid);
    assert!((first.value - 5668.0 / 3704867.0).abs() < 1e-12);
    assert!(second.valid);
    assert!((second.value - 0.8).abs() < 1e-9);

    info!(
        test = "test_sensor_first_read_measures_since_boot",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_sensor_unreadable_stat_is_invalid() {
    init_test_logging();
    info!(test = "test_sensor_unreadable_stat_is_invalid", phase = "setup");

    let root = tempfile::tempdir().expect("tempdir");
    std::fs::write(root.path().join("stat"), "not a stat file\n").expect("write");
    let mut sensor = CpuLoadSensor::with_proc_root(root.path());

    let reading = sensor.read();
    info!(
        test = "test_sensor_unreadable_stat_is_invalid",
        phase = "assert",
        valid = reading.valid
    );
    assert!(!reading.valid);

    info!(
        test = "test_sensor_unreadable_stat_is_invalid",
        phase = "complete",
        status = "passed"
    );
}

fn counters() -> impl Strategy<Value = CpuStats> {
    prop::array::uniform8(0u64..1_000_000).prop_map(|c| CpuStats {
        user: c[0],
        nice: c[1],
        system: c[2],
        idle: c[3],
        iowait: c[4],
        irq: c[5],
        softirq: c[6],
        steal: c[7],
    })
}

proptest! {
    #[test]
    fn busy_fraction_is_a_fraction(prev in counters(), curr in counters()) {
        let fraction = CpuStats::busy_fraction(&prev, &curr);
        prop_assert!((0.0..=1.0).contains(&fraction), "fraction {fraction}");
    }
}
