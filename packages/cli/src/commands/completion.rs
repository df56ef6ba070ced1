// ABOUTME: Shell completion script generation
// ABOUTME: Emits clap_complete output for the requested shell to stdout

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub fn run<C: CommandFactory>(shell: Shell) {
    let mut cmd = C::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
