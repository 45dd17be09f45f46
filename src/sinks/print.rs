use std::io::{self, Stdout, Write};

use crate::entities::{Family, Person};
use crate::error::Result;
use crate::record::Record;
use crate::sink::Sink;

/// Writes every record as pretty JSON (`id`, `type`, `data`, `mdata`)
pub struct PrintSink<W: Write = Stdout> {
    out: W,
}

impl PrintSink<Stdout> {
    pub fn stdout() -> Self {
        PrintSink { out: io::stdout() }
    }
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        PrintSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, record)?;
        writeln!(self.out)?;
        Ok(())
    }
}

impl<W: Write> Sink for PrintSink<W> {
    fn name(&self) -> &str {
        "print"
    }

    fn accept_person(&mut self, person: &Person) -> Result<()> {
        self.write_record(person.record())
    }

    fn accept_family(&mut self, family: &Family) -> Result<()> {
        self.write_record(family.record())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
