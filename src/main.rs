use std::env::args;

use mp2d_harness::{
    result::ReturnResult, utils::dump_mat, utils::print_variables,
    ComputationRequest, Config, Harness,
};

fn main() {
    env_logger::init();
    let (Some(config), Some(request)) = (args().nth(1), args().nth(2)) else {
        eprintln!("usage: mp2d-harness CONFIG.toml REQUEST.toml");
        std::process::exit(1);
    };
    let config = match Config::load(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load {config} with {e}");
            std::process::exit(1);
        }
    };
    let request = match ComputationRequest::load(&request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to load {request} with {e}");
            std::process::exit(1);
        }
    };

    let result = match Harness::new(config).compute(&request) {
        Ok(r) => r,
        Err(f) => {
            eprintln!("{} computation failed: {}", f.error.kind(), f.error);
            if let Some(stdout) = f.record.and_then(|r| r.stdout) {
                eprintln!("{stdout}");
            }
            std::process::exit(1);
        }
    };

    match &result.return_result {
        Some(ReturnResult::Energy(e)) => println!("energy = {e:20.12} Eh"),
        Some(ReturnResult::Gradient(g)) => {
            println!("gradient (Eh/a0):\n{}", dump_mat(g));
        }
        None => {}
    }
    print!("{}", print_variables(&result.qcvars));
}
