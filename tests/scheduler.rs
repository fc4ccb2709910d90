mod support;

use support::{harness, harness_with, small_quantum};
use uvm::TelemetryEventKind;

const CYCLE_B: &str = ":l\npush 66\nout\njump :l\n";
const CYCLE_C: &str = ":l\npush 67\nout\njump :l\n";

#[test]
fn wait_blocks_until_target_halts() {
    let parent = "\
.child b
:main
push .child
push 102
sys
push 103
sys
push 65
out
halt
";
    let child = "push 66\nout\npush 66\nout\npush 66\nout\nhalt\n";
    let mut h = harness_with(small_quantum(4), &[("a", parent), ("b", child)]);
    let a = h.machine.spawn("a").unwrap();

    assert!(!h.machine.run_until(2));
    let task = h.machine.kernel().registry().get(a).unwrap();
    assert!(!task.is_ready());
    assert_eq!(task.wait_for(), Some(a + 1));
    assert_eq!(h.output(), "BB");

    h.machine.run();
    assert_eq!(h.output(), "BBBA");
    let woken = h.telemetry.of_kind(TelemetryEventKind::TaskWake);
    assert_eq!(woken.len(), 1);
    assert_eq!(woken[0].task, a);
}

#[test]
fn spawned_task_runs_first_on_next_pass() {
    let parent = "\
.c c
:main
push .c
push 102
sys
:l
push 65
out
jump :l
";
    let mut h = harness_with(
        small_quantum(3),
        &[("a", parent), ("b", CYCLE_B), ("c", CYCLE_C)],
    );
    h.machine.spawn("a").unwrap();
    h.machine.spawn("b").unwrap();

    assert!(!h.machine.run_until(1));
    assert_eq!(h.output(), "B");
    assert!(!h.machine.run_until(1));
    assert_eq!(h.output(), "BCBA");
    assert_eq!(h.machine.kernel().registry().len(), 3);
}

#[test]
fn fault_in_one_task_leaves_others_running() {
    let mut h = harness(&[("bad", "pop\n"), ("good", "push 66\nout\nhalt\n")]);
    h.machine.spawn("bad").unwrap();
    h.machine.spawn("good").unwrap();

    let report = h.machine.run();
    assert_eq!(h.output(), "B");
    assert_eq!(h.fault_causes(), vec![1]);
    assert_eq!(report.spawned, 2);
    assert_eq!(report.halted, 2);
    assert_eq!(report.faulted, 1);
}

#[test]
fn memory_counter_drains_after_run() {
    let mut h = harness(&[("one", "halt\n"), ("two", "push 1\npop\n")]);
    h.machine.spawn("one").unwrap();
    h.machine.spawn("two").unwrap();
    let footprint = h.machine.kernel().config().limits().footprint();
    assert_eq!(h.machine.kernel().registry().memory_used(), 2 * footprint);

    let report = h.machine.run();
    assert_eq!(h.machine.kernel().registry().memory_used(), 0);
    assert_eq!(report.peak_memory, 2 * footprint);
}

#[test]
fn waiting_on_unknown_task_never_wakes() {
    let program = "push 999\npush 103\nsys\npush 65\nout\n";
    let mut h = harness_with(small_quantum(10), &[("lonely", program)]);
    let id = h.machine.spawn("lonely").unwrap();

    assert!(!h.machine.run_until(5));
    assert_eq!(h.output(), "");
    assert!(!h.machine.kernel().registry().get(id).unwrap().is_ready());
    assert_eq!(h.machine.report().quanta, 1);
}

#[test]
fn exhausted_quantum_resumes_where_it_stopped() {
    let program = "push 1\npush 2\npush 3\nadd\nadd\nassert 6\npush 79\nout\n";
    let mut h = harness_with(small_quantum(2), &[("slow", program)]);
    h.machine.spawn("slow").unwrap();
    let report = h.machine.run();
    assert_eq!(h.output(), "O");
    assert_eq!(report.quanta, 4);
    assert_eq!(report.instructions, 8);
}
