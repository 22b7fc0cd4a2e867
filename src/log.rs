// This file contains functions for writing Votukit's log messages to stderr.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use chrono::Local;
use colored::Colorize;


pub fn section_header(text: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let date = format!("({})", timestamp);
    eprintln!();
    eprintln!("{} {}", text.bold().bright_yellow().underline(), date.dimmed());
}


pub fn explanation(text: &str) {
    let terminal_width = match term_size::dimensions_stderr() {
        Some((w, _)) => w,
        None => 80,
    };
    let width = terminal_width.min(80);
    let mut wrapped = String::new();
    for line in textwrap::wrap(text, width) {
        wrapped.push_str(&line);
        wrapped.push('\n');
    }
    eprint!("{}", wrapped.dimmed());
    eprintln!();
}
