mod support;

use support::{harness, PRINT_STRING};

#[test]
fn itoa_and_atoi_round_trip_through_memory() {
    let program = "\
include print
%buf 16
:main
push -42
push %buf
push 201
sys
assert 3
push %buf
push 202
sys
assert -42
push %buf
call :print
halt
";
    let mut h = harness(&[("main", program), ("print", PRINT_STRING)]);
    h.machine.spawn("main").unwrap();
    h.machine.run();
    assert_eq!(h.output(), "-42");
    assert!(h.fault_causes().is_empty());
}

#[test]
fn spawn_of_unloadable_program_pushes_minus_one() {
    let program = "\
.missing nothing-here
.broken broken
:main
push .missing
push 102
sys
assert -1
push .broken
push 102
sys
assert -1
push 89
out
";
    let mut h = harness(&[("main", program), ("broken", "frobnicate\n")]);
    h.machine.spawn("main").unwrap();
    let report = h.machine.run();
    assert_eq!(h.output(), "Y");
    assert_eq!(h.fault_causes(), vec![0, 0]);
    assert_eq!(report.spawned, 3);
}

#[test]
fn abort_halts_another_task() {
    let program = "\
.spinner spin
:main
push .spinner
push 102
sys
push 104
sys
push 65
out
";
    let mut h = harness(&[("main", program), ("spin", ":l\njump :l\n")]);
    h.machine.spawn("main").unwrap();
    let report = h.machine.run();
    assert_eq!(h.output(), "A");
    assert_eq!(h.fault_causes(), vec![9]);
    assert_eq!(report.halted, 2);
}

#[test]
fn abort_of_self_halts_caller() {
    let program = "push 101\npush 104\nsys\npush 65\nout\n";
    let mut h = harness(&[("main", program)]);
    assert_eq!(h.machine.spawn("main").unwrap(), 101);
    h.machine.run();
    assert_eq!(h.output(), "");
    assert_eq!(h.fault_causes(), vec![9]);
}

#[test]
fn abort_of_unknown_task_is_ignored() {
    let program = "push 4242\npush 104\nsys\npush 65\nout\n";
    let mut h = harness(&[("main", program)]);
    h.machine.spawn("main").unwrap();
    h.machine.run();
    assert_eq!(h.output(), "A");
    assert!(h.fault_causes().is_empty());
}

#[test]
fn introspection_sees_running_task() {
    let program = "\
include print
%name 32
:main
push 110
sys
assert 1
push 0
push 111
sys
assert 101
push 0
push 113
sys
assert 2
push 1
push 113
sys
assert -1
push %name
push 0
push 112
sys
assert 4
push %name
call :print
halt
";
    let mut h = harness(&[("self", program), ("print", PRINT_STRING)]);
    h.machine.spawn("self").unwrap();
    h.machine.run();
    assert!(h.fault_causes().is_empty());
    assert_eq!(h.output(), "self");
}

#[test]
fn memory_used_matches_one_task() {
    let mut h = harness(&[("mem", "push 120\nsys\ndump\n")]);
    h.machine.spawn("mem").unwrap();
    let footprint = h.machine.kernel().config().limits().footprint();
    h.machine.run();
    assert_eq!(h.output(), format!(">>> line 3: [{footprint}]\n"));
}

#[test]
fn unknown_syscall_faults_with_cause_four() {
    let mut h = harness(&[("bad", "push 7\nsys\n")]);
    h.machine.spawn("bad").unwrap();
    h.machine.run();
    assert_eq!(h.fault_causes(), vec![4]);
}

#[test]
fn time_writes_a_parsable_timestamp() {
    let program = "\
%now 16
push %now
push 101
sys
push %now
push 202
sys
dump
";
    let mut h = harness(&[("clock", program)]);
    h.machine.spawn("clock").unwrap();
    h.machine.run();
    let output = h.output();
    let value: i64 = output
        .trim()
        .trim_start_matches(">>> line 8: [")
        .trim_end_matches(']')
        .parse()
        .unwrap();
    assert!(value > 1_600_000_000);
}
