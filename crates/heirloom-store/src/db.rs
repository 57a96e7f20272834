use heirloom_core::error::HeirloomError;
use heirloom_core::event::{Event, EventRecord};
use heirloom_core::guardian::GuardianProfile;
use heirloom_core::types::{Amount, Principal, Timestamp, WillId};
use heirloom_core::will::Will;
use heirloom_core::DepositRecord;
use std::path::Path;

/// Persistent state database backed by sled.
///
/// Named trees:
///   wills     — will_id u64 BE              → bincode(Will)
///   deposits  — will_id u64 BE ‖ index u32 BE → bincode(DepositRecord)
///   guardians — principal bytes             → bincode(GuardianProfile)
///   events    — seq u64 BE                  → bincode(EventRecord)
///   meta      — utf8 key bytes              → raw bytes
///
/// Meta keys: next_will_id, next_event_seq, pending_checks (bincode
/// Vec<WillId>), pending_check_index, paused, total_native_held, and the
/// per-will `native_balance/<id>`, `depositor/<id>`, `deposit_count/<id>`.
pub struct StateDb {
    _db: sled::Db,
    wills: sled::Tree,
    deposits: sled::Tree,
    guardians: sled::Tree,
    events: sled::Tree,
    meta: sled::Tree,
}

fn storage_err(e: sled::Error) -> HeirloomError {
    HeirloomError::Storage(e.to_string())
}

fn ser_err(e: bincode::Error) -> HeirloomError {
    HeirloomError::Serialization(e.to_string())
}

/// Composite key for the deposits tree: will_id BE then index BE, so a
/// per-will prefix scan yields deposits in index order.
fn deposit_key(will_id: WillId, index: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&will_id.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HeirloomError> {
        let db = sled::open(path).map_err(storage_err)?;
        let wills     = db.open_tree("wills").map_err(storage_err)?;
        let deposits  = db.open_tree("deposits").map_err(storage_err)?;
        let guardians = db.open_tree("guardians").map_err(storage_err)?;
        let events    = db.open_tree("events").map_err(storage_err)?;
        let meta      = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self { _db: db, wills, deposits, guardians, events, meta })
    }

    // ── Wills ────────────────────────────────────────────────────────────────

    pub fn get_will(&self, id: WillId) -> Result<Option<Will>, HeirloomError> {
        match self.wills.get(id.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_will(&self, will: &Will) -> Result<(), HeirloomError> {
        let bytes = bincode::serialize(will).map_err(ser_err)?;
        self.wills
            .insert(will.id.to_be_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn will_exists(&self, id: WillId) -> bool {
        self.wills.contains_key(id.to_be_bytes()).unwrap_or(false)
    }

    pub fn count_wills(&self) -> u64 {
        self.wills.len() as u64
    }

    /// Allocate the next sequential will id (starting from 1).
    pub fn next_will_id(&self) -> Result<WillId, HeirloomError> {
        let current = self
            .get_meta_u64("next_will_id")?
            .unwrap_or(1);
        self.put_meta_u64("next_will_id", current + 1)?;
        Ok(current)
    }

    // ── Deposits ─────────────────────────────────────────────────────────────

    pub fn get_deposit(
        &self,
        will_id: WillId,
        index: u32,
    ) -> Result<Option<DepositRecord>, HeirloomError> {
        match self
            .deposits
            .get(deposit_key(will_id, index))
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_deposit(&self, record: &DepositRecord) -> Result<(), HeirloomError> {
        let bytes = bincode::serialize(record).map_err(ser_err)?;
        self.deposits
            .insert(deposit_key(record.will_id, record.index), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    /// All deposits for a will, in index order.
    pub fn iter_deposits(&self, will_id: WillId) -> Result<Vec<DepositRecord>, HeirloomError> {
        let mut out = Vec::new();
        for item in self.deposits.scan_prefix(will_id.to_be_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    /// Number of deposits recorded against a will; the next deposit index.
    pub fn deposit_count(&self, will_id: WillId) -> Result<u32, HeirloomError> {
        Ok(self
            .get_meta_u64(&format!("deposit_count/{will_id}"))?
            .unwrap_or(0) as u32)
    }

    pub fn set_deposit_count(&self, will_id: WillId, count: u32) -> Result<(), HeirloomError> {
        self.put_meta_u64(&format!("deposit_count/{will_id}"), count as u64)
    }

    // ── Vault accumulators ───────────────────────────────────────────────────

    pub fn native_balance(&self, will_id: WillId) -> Result<Amount, HeirloomError> {
        self.get_meta_u128(&format!("native_balance/{will_id}"))
            .map(|v| v.unwrap_or(0))
    }

    pub fn set_native_balance(&self, will_id: WillId, amount: Amount) -> Result<(), HeirloomError> {
        self.put_meta_u128(&format!("native_balance/{will_id}"), amount)
    }

    pub fn total_native_held(&self) -> Result<Amount, HeirloomError> {
        self.get_meta_u128("total_native_held").map(|v| v.unwrap_or(0))
    }

    pub fn set_total_native_held(&self, amount: Amount) -> Result<(), HeirloomError> {
        self.put_meta_u128("total_native_held", amount)
    }

    /// First depositor for a will. Recorded once; later deposits never change it.
    pub fn first_depositor(&self, will_id: WillId) -> Result<Option<Principal>, HeirloomError> {
        match self
            .meta
            .get(format!("depositor/{will_id}").as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes[..32]);
                Ok(Some(Principal::from_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn record_first_depositor(
        &self,
        will_id: WillId,
        depositor: &Principal,
    ) -> Result<(), HeirloomError> {
        let key = format!("depositor/{will_id}");
        if self.meta.get(key.as_bytes()).map_err(storage_err)?.is_none() {
            self.meta
                .insert(key.as_bytes(), depositor.as_bytes().as_slice())
                .map_err(storage_err)?;
        }
        Ok(())
    }

    // ── Guardians ────────────────────────────────────────────────────────────

    pub fn get_guardian(
        &self,
        principal: &Principal,
    ) -> Result<Option<GuardianProfile>, HeirloomError> {
        match self
            .guardians
            .get(principal.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_guardian(&self, profile: &GuardianProfile) -> Result<(), HeirloomError> {
        let bytes = bincode::serialize(profile).map_err(ser_err)?;
        self.guardians
            .insert(profile.principal.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_guardians(&self) -> Result<Vec<GuardianProfile>, HeirloomError> {
        let mut out = Vec::new();
        for item in self.guardians.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    // ── Event log ────────────────────────────────────────────────────────────

    /// Append an event, assigning it the next sequence number.
    pub fn append_event(&self, at: Timestamp, event: Event) -> Result<u64, HeirloomError> {
        let seq = self.get_meta_u64("next_event_seq")?.unwrap_or(0);
        let record = EventRecord { seq, at, event };
        let bytes = bincode::serialize(&record).map_err(ser_err)?;
        self.events
            .insert(seq.to_be_bytes(), bytes)
            .map_err(storage_err)?;
        self.put_meta_u64("next_event_seq", seq + 1)?;
        Ok(seq)
    }

    /// All events with `seq >= from`, in sequence order.
    pub fn events_since(&self, from: u64) -> Result<Vec<EventRecord>, HeirloomError> {
        let mut out = Vec::new();
        for item in self.events.range(from.to_be_bytes()..) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    // ── Scheduler queue ──────────────────────────────────────────────────────

    /// The pending-check queue: ids of live wills the scheduler cycles over.
    pub fn pending_queue(&self) -> Result<Vec<WillId>, HeirloomError> {
        match self.meta.get(b"pending_checks").map_err(storage_err)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes).map_err(ser_err)?),
            None => Ok(Vec::new()),
        }
    }

    fn put_pending_queue(&self, queue: &[WillId]) -> Result<(), HeirloomError> {
        let bytes = bincode::serialize(&queue.to_vec()).map_err(ser_err)?;
        self.meta
            .insert(b"pending_checks", bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn push_pending(&self, will_id: WillId) -> Result<(), HeirloomError> {
        let mut queue = self.pending_queue()?;
        queue.push(will_id);
        self.put_pending_queue(&queue)
    }

    /// Prune a released will from the queue, clamping the cursor to the new
    /// length so the ring never revisits dead entries.
    pub fn remove_pending(&self, will_id: WillId) -> Result<(), HeirloomError> {
        let mut queue = self.pending_queue()?;
        queue.retain(|id| *id != will_id);
        self.put_pending_queue(&queue)?;
        let cursor = self.pending_cursor()?;
        if !queue.is_empty() && cursor as usize >= queue.len() {
            self.set_pending_cursor(cursor % queue.len() as u64)?;
        } else if queue.is_empty() {
            self.set_pending_cursor(0)?;
        }
        Ok(())
    }

    pub fn pending_cursor(&self) -> Result<u64, HeirloomError> {
        self.get_meta_u64("pending_check_index").map(|v| v.unwrap_or(0))
    }

    pub fn set_pending_cursor(&self, cursor: u64) -> Result<(), HeirloomError> {
        self.put_meta_u64("pending_check_index", cursor)
    }

    // ── Pause gate ───────────────────────────────────────────────────────────

    pub fn paused(&self) -> Result<bool, HeirloomError> {
        Ok(self
            .meta
            .get(b"paused")
            .map_err(storage_err)?
            .map(|b| b.as_ref() == b"1")
            .unwrap_or(false))
    }

    pub fn set_paused(&self, paused: bool) -> Result<(), HeirloomError> {
        let value: &[u8] = if paused { b"1" } else { b"0" };
        self.meta.insert(b"paused", value).map_err(storage_err)?;
        Ok(())
    }

    // ── Meta helpers ─────────────────────────────────────────────────────────

    fn get_meta_u64(&self, key: &str) -> Result<Option<u64>, HeirloomError> {
        match self.meta.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[..8]);
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    fn put_meta_u64(&self, key: &str, value: u64) -> Result<(), HeirloomError> {
        self.meta
            .insert(key.as_bytes(), value.to_be_bytes().to_vec())
            .map_err(storage_err)?;
        Ok(())
    }

    fn get_meta_u128(&self, key: &str) -> Result<Option<u128>, HeirloomError> {
        match self.meta.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes[..16]);
                Ok(Some(u128::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    fn put_meta_u128(&self, key: &str, value: u128) -> Result<(), HeirloomError> {
        self.meta
            .insert(key.as_bytes(), value.to_be_bytes().to_vec())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), HeirloomError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heirloom_core::asset::AssetKind;
    use heirloom_core::will::equal_shares;
    use heirloom_core::{Cid, PayloadHash};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("heirloom_store_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn principal(tag: u8) -> Principal {
        Principal::from_bytes([tag; 32])
    }

    fn sample_will(id: WillId) -> Will {
        let guardians = vec![principal(10), principal(11)];
        let guardian_index = guardians
            .iter()
            .enumerate()
            .map(|(i, g)| (*g, i as u8))
            .collect();
        Will {
            id,
            owner: principal(1),
            beneficiaries: vec![principal(2)],
            shares_bp: equal_shares(1),
            guardians,
            guardian_index,
            guardian_threshold: 2,
            encrypted_cid: Cid("bafy-store-test".into()),
            payload_hash: PayloadHash([0xBB; 32]),
            heartbeat_timeout: 86_400,
            last_heartbeat: 500,
            vault_address: None,
            approvals_bitmap: 0,
            release_requested: false,
            release_request_ts: 0,
            released: false,
            created_at: 500,
        }
    }

    #[test]
    fn will_round_trip() {
        let db = temp_db("will_rt");
        let will = sample_will(1);
        db.put_will(&will).unwrap();
        let loaded = db.get_will(1).unwrap().unwrap();
        assert_eq!(loaded.owner, will.owner);
        assert_eq!(loaded.guardian_index, will.guardian_index);
        assert!(db.get_will(2).unwrap().is_none());
        assert!(db.will_exists(1) && !db.will_exists(2));
        assert_eq!(db.count_wills(), 1);
        db.flush().unwrap();
    }

    #[test]
    fn will_ids_are_sequential_from_one() {
        let db = temp_db("will_ids");
        assert_eq!(db.next_will_id().unwrap(), 1);
        assert_eq!(db.next_will_id().unwrap(), 2);
        assert_eq!(db.next_will_id().unwrap(), 3);
    }

    #[test]
    fn deposits_scan_in_index_order() {
        let db = temp_db("dep_order");
        for index in [2u32, 0, 1] {
            db.put_deposit(&DepositRecord {
                will_id: 9,
                index,
                asset: AssetKind::Native { amount: 100 + index as u128 },
                depositor: principal(3),
                deposited_at: 0,
                released: false,
            })
            .unwrap();
        }
        // A deposit under another will must not leak into the scan.
        db.put_deposit(&DepositRecord {
            will_id: 10,
            index: 0,
            asset: AssetKind::Native { amount: 1 },
            depositor: principal(3),
            deposited_at: 0,
            released: false,
        })
        .unwrap();

        let deposits = db.iter_deposits(9).unwrap();
        let indexes: Vec<u32> = deposits.iter().map(|d| d.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn first_depositor_is_sticky() {
        let db = temp_db("first_dep");
        db.record_first_depositor(4, &principal(7)).unwrap();
        db.record_first_depositor(4, &principal(8)).unwrap();
        assert_eq!(db.first_depositor(4).unwrap(), Some(principal(7)));
    }

    #[test]
    fn event_log_sequences_and_tails() {
        let db = temp_db("events");
        db.append_event(10, Event::Heartbeat { will_id: 1 }).unwrap();
        db.append_event(11, Event::Heartbeat { will_id: 2 }).unwrap();
        db.append_event(12, Event::Heartbeat { will_id: 3 }).unwrap();

        let all = db.events_since(0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].seq, 0);
        assert_eq!(all[2].at, 12);

        let tail = db.events_since(2).unwrap();
        assert_eq!(tail.len(), 1);
        assert!(matches!(tail[0].event, Event::Heartbeat { will_id: 3 }));
    }

    #[test]
    fn pending_queue_prunes_and_clamps_cursor() {
        let db = temp_db("queue");
        for id in [1u64, 2, 3] {
            db.push_pending(id).unwrap();
        }
        db.set_pending_cursor(2).unwrap();

        db.remove_pending(3).unwrap();
        assert_eq!(db.pending_queue().unwrap(), vec![1, 2]);
        assert_eq!(db.pending_cursor().unwrap(), 0, "cursor wraps into new length");

        db.remove_pending(1).unwrap();
        db.remove_pending(2).unwrap();
        assert!(db.pending_queue().unwrap().is_empty());
        assert_eq!(db.pending_cursor().unwrap(), 0);
    }

    #[test]
    fn pause_flag_round_trip() {
        let db = temp_db("pause");
        assert!(!db.paused().unwrap());
        db.set_paused(true).unwrap();
        assert!(db.paused().unwrap());
        db.set_paused(false).unwrap();
        assert!(!db.paused().unwrap());
    }
}
