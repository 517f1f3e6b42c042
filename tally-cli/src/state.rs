//! `~/.tally` (or `$TALLY_HOME`): config, merchant rules, JSON ledgers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tally_core::{Draft, Expense, Member, MemberBalance, MemberId};
use tally_finance::RuleBook;

pub fn tally_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TALLY_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tally"))
}

pub fn ensure_tally_home() -> Result<PathBuf> {
    let dir = tally_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn rules_path(home: &Path, owner: &MemberId) -> PathBuf {
    let safe: String = owner
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    home.join("rules").join(format!("{safe}.json"))
}

/// The owner's rule book; empty when none was saved yet.
pub fn read_rules(home: &Path, owner: &MemberId) -> Result<RuleBook> {
    let p = rules_path(home, owner);
    if !p.exists() {
        return Ok(RuleBook::new(owner.clone()));
    }
    read_json(&p)
}

pub fn write_rules(home: &Path, book: &RuleBook) -> Result<()> {
    let owner = book
        .owner
        .as_ref()
        .context("rule book has no owner")?;
    let p = rules_path(home, owner);
    if let Some(dir) = p.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    write_json(&p, book)
}

/// A group's committed state, as exported from the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    /// Drafts behind the expenses; used when balances need rebuilding.
    #[serde(default)]
    pub drafts: Vec<Draft>,
    /// Balances as reported by the primary store, if exported.
    #[serde(default)]
    pub balances: Option<Vec<MemberBalance>>,
}

pub fn read_ledger(path: &Path) -> Result<Ledger> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_finance::MerchantRule;

    #[test]
    fn test_rules_round_trip_per_owner() {
        let dir = tempfile::tempdir().unwrap();
        let owner = MemberId::from("user/42");

        let empty = read_rules(dir.path(), &owner).unwrap();
        assert!(empty.rules().is_empty());
        assert_eq!(empty.owner.as_ref(), Some(&owner));

        let mut book = RuleBook::new(owner.clone());
        book.upsert(MerchantRule::regex(r"^sq \*", "Square"));
        book.remember("Kroger #101", "Groceries");
        write_rules(dir.path(), &book).unwrap();

        assert!(rules_path(dir.path(), &owner).ends_with("rules/user_42.json"));
        assert_eq!(read_rules(dir.path(), &owner).unwrap(), book);
        let other = read_rules(dir.path(), &MemberId::from("someone-else")).unwrap();
        assert!(other.rules().is_empty());
    }

    #[test]
    fn test_ledger_accepts_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ledger.json");
        fs::write(
            &p,
            r#"{"members": [{"member_id": "a", "display_name": "Asha"}, {"member_id": "b"}]}"#,
        )
        .unwrap();
        let ledger = read_ledger(&p).unwrap();
        assert_eq!(ledger.members.len(), 2);
        assert!(ledger.expenses.is_empty());
        assert!(ledger.balances.is_none());
    }

    #[test]
    fn test_read_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nope.json");
        let err = read_ledger(&p).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
