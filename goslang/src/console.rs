use std::io::{self, Write};

use parking_lot::Mutex;

#[derive(Debug)]
enum Sink {
    Stdout,
    Capture(Vec<String>),
}

/// Line sink shared by every execution unit. Each line is written under
/// one lock, so lines from concurrent goroutines never interleave.
#[derive(Debug)]
pub struct Console {
    sink: Mutex<Sink>,
}

impl Console {
    pub fn stdout() -> Self {
        Self {
            sink: Mutex::new(Sink::Stdout),
        }
    }

    /// Keeps lines in memory instead of printing them.
    pub fn capture() -> Self {
        Self {
            sink: Mutex::new(Sink::Capture(Vec::new())),
        }
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        match &mut *sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{line}")?;
                out.flush()
            }
            Sink::Capture(lines) => {
                lines.push(line.to_owned());
                Ok(())
            }
        }
    }

    /// Lines captured so far; empty for stdout consoles.
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock() {
            Sink::Stdout => Vec::new(),
            Sink::Capture(lines) => lines.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn capture_keeps_whole_lines_across_threads() {
        let console = Arc::new(Console::capture());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let console = console.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        console.write_line(&format!("{t} {i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let lines = console.lines();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|l| l.split(' ').count() == 2));
    }
}
