use crate::entities::{Family, Person};
use crate::error::Result;
use crate::sink::Sink;

/// Keeps a copy of every entity it is offered
#[derive(Debug, Default)]
pub struct MemorySink {
    people: Vec<Person>,
    families: Vec<Family>,
    ids: Vec<String>,
    flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Ids of every entity, in arrival order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn accept_person(&mut self, person: &Person) -> Result<()> {
        self.ids.push(person.id().to_string());
        self.people.push(person.clone());
        Ok(())
    }

    fn accept_family(&mut self, family: &Family) -> Result<()> {
        self.ids.push(family.id().to_string());
        self.families.push(family.clone());
        Ok(())
    }

    fn on_discard_existing_output(&mut self) -> Result<()> {
        self.people.clear();
        self.families.clear();
        self.ids.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
