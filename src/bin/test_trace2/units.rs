/*!
 * Unit Scenarios
 * One function per scenario; each returns the process exit code or
 * terminates through the session
 */

use std::str::FromStr;
use std::thread;
use std::time::Duration;
use trace2::core::limits::CHILD_FAILURE_CODE;
use trace2::{ExitCode, Trace2};
use tracing::debug;

const USAGE_PREFIX: &str = "test-trace2";
const USAGE_EXIT_CODE: ExitCode = 129;

const TIMER_TEST1: &str = "test/test1";
const TIMER_TEST2: &str = "test/test2";
const COUNTER_TEST1: &str = "test/test1";
const COUNTER_TEST2: &str = "test/test2";

type UnitFn = fn(&Trace2, &[String]) -> ExitCode;

struct Unit {
    name: &'static str,
    usage: &'static str,
    run: UnitFn,
}

const UNITS: &[Unit] = &[
    Unit {
        name: "001return",
        usage: "<exit_code>",
        run: ut_001return,
    },
    Unit {
        name: "002exit",
        usage: "<exit_code>",
        run: ut_002exit,
    },
    Unit {
        name: "003error",
        usage: "<error_message>+",
        run: ut_003error,
    },
    Unit {
        name: "004child",
        usage: "[<child_command_line>]",
        run: ut_004child,
    },
    Unit {
        name: "005exec",
        usage: "<command_line>",
        run: ut_005exec,
    },
    Unit {
        name: "006data",
        usage: "[<category> <key> <value>]+",
        run: ut_006data,
    },
    Unit {
        name: "007bug",
        usage: "",
        run: ut_007bug,
    },
    Unit {
        name: "008bug",
        usage: "",
        run: ut_008bug,
    },
    Unit {
        name: "009bug_BUG",
        usage: "",
        run: ut_009bug_bug,
    },
    Unit {
        name: "010bug_BUG",
        usage: "",
        run: ut_010bug_bug,
    },
    Unit {
        name: "100timer",
        usage: "<count> <ms_delay>",
        run: ut_100timer,
    },
    Unit {
        name: "101timer",
        usage: "<count> <ms_delay> <threads>",
        run: ut_101timer,
    },
    Unit {
        name: "200counter",
        usage: "<v1> [<v2> [<v3> [...]]]",
        run: ut_200counter,
    },
    Unit {
        name: "201counter",
        usage: "<v1> <v2> <threads>",
        run: ut_201counter,
    },
];

/// Run the unit named by `args[0]` with the remaining arguments
pub fn dispatch(trace: &Trace2, args: &[String]) -> ExitCode {
    let Some((name, rest)) = args.split_first() else {
        return print_usage();
    };
    match UNITS.iter().find(|unit| unit.name == name.as_str()) {
        Some(unit) => {
            let _span = trace2::diagnostics::unit_span(unit.name).entered();
            debug!(unit = unit.name, args = rest.len(), "running unit");
            (unit.run)(trace, rest)
        }
        None => print_usage(),
    }
}

fn print_usage() -> ExitCode {
    eprintln!("usage:");
    for unit in UNITS {
        eprintln!("\t{} {} {}", USAGE_PREFIX, unit.name, unit.usage);
    }
    USAGE_EXIT_CODE
}

fn parse<T: FromStr>(trace: &Trace2, arg: Option<&String>, usage: &str) -> T {
    match arg.and_then(|a| a.parse().ok()) {
        Some(value) => value,
        None => trace.die(usage),
    }
}

/// Return the requested code from the unit
fn ut_001return(trace: &Trace2, args: &[String]) -> ExitCode {
    parse(trace, args.first(), "expect <exit_code>")
}

/// Exit with the requested code without returning
fn ut_002exit(trace: &Trace2, args: &[String]) -> ExitCode {
    let code = parse(trace, args.first(), "expect <exit_code>");
    trace.exit(code)
}

/// Record each argument as an error; multiple errors are allowed
fn ut_003error(trace: &Trace2, args: &[String]) -> ExitCode {
    if args.is_empty() {
        trace.die("expect <error_message>");
    }
    for message in args {
        trace.error(message);
    }
    0
}

/// Run a child and exit with its code
///
/// An empty command line returns 0 so nesting can end anywhere.
fn ut_004child(trace: &Trace2, args: &[String]) -> ExitCode {
    if args.is_empty() {
        return 0;
    }
    match trace.run_child(args) {
        Ok(code) => trace.exit(code),
        Err(e) => {
            trace.error(&e.to_string());
            trace.exit(CHILD_FAILURE_CODE)
        }
    }
}

/// Replace this process with the command line
fn ut_005exec(trace: &Trace2, args: &[String]) -> ExitCode {
    if args.is_empty() {
        return 0;
    }
    match trace.exec(args) {
        Ok(code) => code,
        Err(e) => {
            trace.error(&e.to_string());
            CHILD_FAILURE_CODE
        }
    }
}

fn ut_006data(trace: &Trace2, args: &[String]) -> ExitCode {
    let usage = "expect <cat0> <k0> <v0> [<cat1> <k1> <v1> [...]]";
    if args.len() % 3 != 0 {
        trace.die(usage);
    }
    for triple in args.chunks_exact(3) {
        if triple.iter().any(|field| field.is_empty()) {
            trace.die(usage);
        }
        trace.data(&triple[0], &triple[1], &triple[2]);
    }
    0
}

fn ut_007bug(trace: &Trace2, _args: &[String]) -> ExitCode {
    trace.fatal_bug("the bug message")
}

fn ut_008bug(trace: &Trace2, _args: &[String]) -> ExitCode {
    trace.bug("a bug message");
    trace.bug("another bug message");
    trace.bug_if_bug(
        "an explicit BUG_if_bug() following bug() call(s) is nice, but not required",
    );
    0
}

/// Unchecked bugs are caught when the session finishes
fn ut_009bug_bug(trace: &Trace2, _args: &[String]) -> ExitCode {
    trace.bug("a bug message");
    trace.bug("another bug message");
    0
}

fn ut_010bug_bug(trace: &Trace2, _args: &[String]) -> ExitCode {
    trace.bug("a bug message");
    trace.fatal_bug("a BUG message")
}

fn timer_loop(trace: &Trace2, id: &str, count: u32, delay: Duration) {
    for _ in 0..count {
        trace.timer_start(id);
        thread::sleep(delay);
        trace.timer_stop(id);
    }
}

/// Single-threaded timer intervals on TEST1
fn ut_100timer(trace: &Trace2, args: &[String]) -> ExitCode {
    let usage = "expect <count> <ms_delay>";
    if args.len() != 2 {
        trace.die(usage);
    }
    let count: u32 = parse(trace, args.first(), usage);
    let delay: u64 = parse(trace, args.get(1), usage);

    timer_loop(trace, TIMER_TEST1, count, Duration::from_millis(delay));
    0
}

/// Run `body` on `threads` registered worker threads and join them all
fn run_workers<F>(trace: &Trace2, threads: u32, name: &str, body: F)
where
    F: Fn() + Sync,
{
    thread::scope(|scope| {
        let mut handles = Vec::new();
        for k in 0..threads {
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, k))
                .spawn_scoped(scope, || {
                    if trace.thread_start(name).is_ok() {
                        body();
                        trace.thread_exit();
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(_) => trace.die(&format!("failed to create thread[{}]", k)),
            }
        }
        for (k, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                trace.die(&format!("failed to join thread[{}]", k));
            }
        }
    });
}

/// Per-thread `th_timer` plus one aggregate `timer` on TEST2
fn ut_101timer(trace: &Trace2, args: &[String]) -> ExitCode {
    let usage = "expect <count> <ms_delay> <threads>";
    if args.len() != 3 {
        trace.die(usage);
    }
    let count: u32 = parse(trace, args.first(), usage);
    let delay: u64 = parse(trace, args.get(1), usage);
    let threads: u32 = parse(trace, args.get(2), usage);

    let delay = Duration::from_millis(delay);
    run_workers(trace, threads, "ut_101", || {
        timer_loop(trace, TIMER_TEST2, count, delay)
    });
    0
}

/// Sum of all values reported in the aggregate TEST1 counter
fn ut_200counter(trace: &Trace2, args: &[String]) -> ExitCode {
    let usage = "expect <v1> [<v2> [...]]";
    if args.is_empty() {
        trace.die(usage);
    }
    for arg in args {
        match arg.parse::<i64>() {
            Ok(value) => trace.counter_add(COUNTER_TEST1, value),
            Err(_) => trace.die(&format!("invalid value[{}] -- {}", arg, usage)),
        }
    }
    0
}

/// Per-thread `th_counter` partials plus one aggregate TEST2 counter
fn ut_201counter(trace: &Trace2, args: &[String]) -> ExitCode {
    let usage = "expect <v1> <v2> <threads>";
    if args.len() != 3 {
        trace.die(usage);
    }
    let v1: i64 = parse(trace, args.first(), usage);
    let v2: i64 = parse(trace, args.get(1), usage);
    let threads: u32 = parse(trace, args.get(2), usage);

    run_workers(trace, threads, "ut_201", || {
        trace.counter_add(COUNTER_TEST2, v1);
        trace.counter_add(COUNTER_TEST2, v2);
    });
    0
}
