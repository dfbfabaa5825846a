//! Template distribution editor
//!
//! Splits the unsent leads across templates. Every edit keeps
//! `sum(count) <= total_leads`, clamping the entry being edited.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DistributionError {
    #[error("No templates available")]
    NoTemplates,

    #[error("No distribution entry at position {0}")]
    NoSuchEntry(usize),

    #[error("The first distribution entry cannot be removed")]
    FirstEntry,

    #[error("Invalid split '{0}', expected TEMPLATE_ID=COUNT")]
    InvalidSplit(String),
}

/// How many leads go to one template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub template_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
    entries: Vec<DistributionEntry>,
    total_leads: u64,
}

impl Distribution {
    /// One empty entry for the first template, as the send page opens
    pub fn new(total_leads: u64, first_template: Option<&str>) -> Self {
        Self {
            entries: vec![DistributionEntry {
                template_id: first_template.unwrap_or_default().to_string(),
                count: 0,
            }],
            total_leads,
        }
    }

    pub fn entries(&self) -> &[DistributionEntry] {
        &self.entries
    }

    pub fn total_leads(&self) -> u64 {
        self.total_leads
    }

    /// Append `{first template, 0}`
    pub fn add(&mut self, first_template: Option<&str>) -> Result<usize, DistributionError> {
        let template_id = first_template.ok_or(DistributionError::NoTemplates)?;
        self.entries.push(DistributionEntry {
            template_id: template_id.to_string(),
            count: 0,
        });
        Ok(self.entries.len() - 1)
    }

    /// Set an entry's count, clamped so the total never exceeds the
    /// available leads. Returns the count actually stored.
    pub fn set_count(&mut self, index: usize, count: u64) -> Result<u64, DistributionError> {
        let others: u64 = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.count)
            .sum();

        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DistributionError::NoSuchEntry(index))?;

        let overflow = (others + count).saturating_sub(self.total_leads);
        entry.count = count.saturating_sub(overflow);
        Ok(entry.count)
    }

    pub fn set_template(&mut self, index: usize, template_id: &str) -> Result<(), DistributionError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DistributionError::NoSuchEntry(index))?;
        entry.template_id = template_id.to_string();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<DistributionEntry, DistributionError> {
        if index == 0 {
            return Err(DistributionError::FirstEntry);
        }
        if index >= self.entries.len() {
            return Err(DistributionError::NoSuchEntry(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Update the available lead count and trim counts from the last
    /// entry backwards until they fit again.
    pub fn set_total_leads(&mut self, total_leads: u64) {
        self.total_leads = total_leads;
        let mut overflow = self.emails_to_send().saturating_sub(total_leads);
        for entry in self.entries.iter_mut().rev() {
            if overflow == 0 {
                break;
            }
            let cut = entry.count.min(overflow);
            entry.count -= cut;
            overflow -= cut;
        }
    }

    pub fn emails_to_send(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Template id the bulk-send request carries
    pub fn primary_template(&self) -> Option<&str> {
        self.entries
            .first()
            .map(|e| e.template_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Parse a `TEMPLATE_ID=COUNT` command-line split
pub fn parse_split(raw: &str) -> Result<(String, u64), DistributionError> {
    let invalid = || DistributionError::InvalidSplit(raw.to_string());
    let (template_id, count) = raw.split_once('=').ok_or_else(invalid)?;
    let template_id = template_id.trim();
    if template_id.is_empty() {
        return Err(invalid());
    }
    let count = count.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok((template_id.to_string(), count))
}
