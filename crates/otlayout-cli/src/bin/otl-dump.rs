use otlayout_cli::{dump, read_args, read_input, registry};
use std::io;
use std::process;

fn main() {
    env_logger::init();
    let matches = read_args(
        "otl-dump",
        "Prints the scripts, features and lookups of a GSUB or GPOS table",
    );
    let offset: usize = match matches.value_of("offset").unwrap_or("0").parse() {
        Ok(offset) => offset,
        Err(e) => {
            log::error!("Bad offset: {}", e);
            process::exit(2);
        }
    };
    let data = match read_input(&matches) {
        Ok(data) => data,
        Err(e) => {
            log::error!("Could not read input: {}", e);
            process::exit(1);
        }
    };
    let table = match otlayout::parse(&data, offset, &registry(&matches)) {
        Ok(table) => table,
        Err(e) => {
            log::error!("Could not parse layout table: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = dump(&table, &mut io::stdout().lock()) {
        log::error!("{}", e);
        process::exit(1);
    }
}
