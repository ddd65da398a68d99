//! Components command

use wisefood_compiler::generator_names;

use crate::Result;

pub fn run() -> Result<()> {
    for name in generator_names() {
        println!("{}", name);
    }
    Ok(())
}
