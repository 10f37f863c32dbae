/*
A toy example of driving an IPASIR solver through the bindings.

The example counts the valuations of the number of atoms given as the first input, blocking each model found by adding its negation as a clause.
If a path to an IPASIR library is given as the second input the library is loaded and used, otherwise the small solver linked into the example is used.

A learn callback prints an ascii character for each short clause the solver reports learning.

To run the example (e.g.): cargo run --example model_count 6
Or, with a library: cargo run --example model_count 6 /usr/lib/libcadical.so
 */

use std::sync::atomic::{AtomicUsize, Ordering};

use ipasir_link::{
    address::NativeAddress,
    ipasir::Ipasir,
    registry::SolverData,
    solver::SolveResult,
    symbols::SymbolTable,
};

fn glyph(length: usize) -> char {
    match length {
        1 => '!',
        2 => '\'',
        l if l < 5 => '*',
        _ => '.',
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Each model is found by a solve of its own, so the count is kept small.
    const MAX_ATOMS: i32 = 20;

    let atoms: i32 = match args.get(1).map(|count| count.parse()) {
        Some(Ok(count)) if 0 < count && count <= MAX_ATOMS => count,
        Some(Ok(count)) => {
            println!("c {count} atoms is outside of 1..={MAX_ATOMS}");
            std::process::exit(1);
        }
        _ => 4,
    };

    let ipasir = match args.get(2) {
        Some(path) => {
            let library = match unsafe { libloading::Library::new(path) } {
                Ok(library) => library,
                Err(e) => {
                    println!("c Failed to load {path}: {e}");
                    std::process::exit(1);
                }
            };
            Ipasir::new(library)
        }
        None => {
            let table: SymbolTable = ipasir_dpll::exports()
                .into_iter()
                .map(|(symbol, address)| (symbol, NativeAddress::from(address)))
                .collect();
            Ipasir::new(table)
        }
    };

    if let Err(e) = ipasir.resolve_all() {
        println!("c {e}");
        std::process::exit(1);
    }

    match ipasir.signature() {
        Ok(signature) => println!("c Solving with {signature}"),
        Err(e) => println!("c {e}"),
    }

    let mut solver = match ipasir.init() {
        Ok(solver) => solver,
        Err(e) => {
            println!("c {e}");
            std::process::exit(1);
        }
    };

    let longest = SolverData::new(AtomicUsize::new(0));
    let installed = solver.set_learn(&longest, 8, |longest: &AtomicUsize, clause| {
        longest.fetch_max(clause.len(), Ordering::Relaxed);
        print!("{}", glyph(clause.len()));
    });
    if let Err(e) = installed {
        println!("c {e}");
    }

    let mut count = 0;
    loop {
        match solver.solve() {
            Ok(SolveResult::Satisfiable) => {}
            Ok(_) => break,
            Err(e) => {
                println!("c {e}");
                std::process::exit(1);
            }
        }
        count += 1;

        let model = match solver.model(atoms) {
            Ok(model) => model,
            Err(e) => {
                println!("c {e}");
                std::process::exit(1);
            }
        };

        // Atoms without a value are given a value, to keep the count exact.
        let blocking = (1..=atoms)
            .zip(model)
            .map(|(atom, value)| if value == 0 { -atom } else { -value })
            .collect::<Vec<_>>();

        if let Err(e) = solver.add_clause(&blocking) {
            println!("c {e}");
            std::process::exit(1);
        }
    }

    println!();
    println!("c Longest learnt clause: {}", longest.load(Ordering::Relaxed));
    println!("c Models: {count}");
    assert_eq!(Some(count), 2_usize.checked_pow(atoms.unsigned_abs()));

    solver.release();
}
