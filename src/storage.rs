use std::sync::Mutex;

use anyhow::Result;

use crate::toll_db::TollDb;

/// Owns the toll database. The HTTP layer keeps one `Storage` behind an `Arc`
/// and funnels every database touch through `with_db`, so locking stays in
/// one place.
pub struct Storage {
    toll_db: Mutex<TollDb>,
}

impl Storage {
    pub fn init(support_dir: &str) -> Result<Self> {
        let toll_db = TollDb::open(support_dir)?;
        Ok(Storage {
            toll_db: Mutex::new(toll_db),
        })
    }

    pub fn with_db<T>(&self, f: impl FnOnce(&mut TollDb) -> T) -> T {
        let mut toll_db = self.toll_db.lock().unwrap();
        f(&mut toll_db)
    }
}
