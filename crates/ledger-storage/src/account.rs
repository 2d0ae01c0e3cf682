//! Balance persistence: `<NodeId>_account.txt`.

use ledger_core::LedgerResult;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Stores a single cluster's integer balance as a decimal number in
/// `<NodeId>_account.txt`, per §6.
///
/// This specification requires integer balances throughout (§9, open
/// question 4) to avoid the rounding divergence the source exhibits
/// between its float and integer code paths.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    file: File,
}

impl AccountStore {
    /// Open (creating if necessary) the balance file for `node_id` under
    /// `base_dir`, initializing it to zero if newly created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created; this is
    /// a fatal-only startup condition per §7.
    pub fn open(base_dir: &Path, node_id: &str) -> LedgerResult<Self> {
        let path = base_dir.join(format!("{node_id}_account.txt"));
        let is_new = !path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        if is_new {
            write!(file, "0")?;
            file.sync_all()?;
        }

        Ok(Self { path, file })
    }

    /// Current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are
    /// not a valid integer.
    pub fn read(&mut self) -> LedgerResult<i64> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        self.file.read_to_string(&mut contents)?;
        let trimmed = contents.trim();
        let value = trimmed.parse::<i64>().map_err(|err| {
            ledger_core::LedgerError::Internal(format!(
                "corrupt balance file {}: {err}",
                self.path.display()
            ))
        })?;
        Ok(value)
    }

    /// Overwrite the balance and fsync before returning, so that a
    /// subsequent `prepared`/`committed` reply is only sent after the
    /// new value is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or fsync fails.
    pub fn write(&mut self, balance: i64) -> LedgerResult<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        write!(self.file, "{balance}")?;
        self.file.sync_all()?;
        Ok(())
    }
}
