use ordkv::engine::{Engine, Outcome};
use ordkv::error::Error;

fn main() {
    println!("Hello, ordkv!");

    run().unwrap();

    println!("Bye~");
}

fn run() -> Result<(), Error> {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut engine = Engine::open(dir.path().join("data.db"))?;

    dispatch(&mut engine, "SET b 1");
    dispatch(&mut engine, "SET b 2");

    dispatch(&mut engine, "SET e 5");
    dispatch(&mut engine, "DEL e");

    dispatch(&mut engine, "SET c 0");
    dispatch(&mut engine, "DEL c");
    dispatch(&mut engine, "SET c 3");

    dispatch(&mut engine, "SET a 1");

    dispatch(&mut engine, "DEL f");

    dispatch(&mut engine, "DEL d");
    dispatch(&mut engine, "SET d 4");

    // Make sure the range yields the expected results.
    assert_eq!(lines(engine.dispatch("RANGE \"\" \"\"")), vec!["a", "b", "c", "d", "END"]);

    dispatch(&mut engine, "EXPIRE b 50");
    println!("b ttl: {:?}", lines(engine.dispatch("TTL b")));

    dispatch(&mut engine, "BEGIN");
    dispatch(&mut engine, "SET a 9");
    println!("a inside txn: {:?}", lines(engine.dispatch("GET a")));
    dispatch(&mut engine, "ABORT");
    println!("a after abort: {:?}", lines(engine.dispatch("GET a")));

    Ok(())
}

fn dispatch(engine: &mut Engine, line: &str) -> Vec<String> {
    match engine.dispatch(line) {
        Outcome::Continue(lines) => lines,
        Outcome::Exit(lines) => lines,
    }
}

fn lines(outcome: Outcome) -> Vec<String> {
    match outcome {
        Outcome::Continue(l) | Outcome::Exit(l) => l,
    }
}
