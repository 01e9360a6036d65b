use anyhow::{Context, Result};
use obscura_privacy::TokenId;
use obscura_transaction::state::{ChainState, LedgerDiff, TokenInfo};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const CF_SERIAL_NUMBERS: &str = "serial_numbers";
/// v1 commitment -> list index
const CF_COMMITMENTS: &str = "commitments";
/// v2 one-time address -> list index
const CF_ONE_TIME_ADDRESSES: &str = "one_time_addresses";
const CF_SNDS: &str = "snds";
/// (token, shard, version, index) -> commitment or ring member
const CF_COIN_LISTS: &str = "coin_lists";
const CF_LIST_LENGTHS: &str = "list_lengths";
const CF_TOKENS: &str = "tokens";
const CF_BRIDGE_TOKENS: &str = "bridge_tokens";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_SERIAL_NUMBERS,
    CF_COMMITMENTS,
    CF_ONE_TIME_ADDRESSES,
    CF_SNDS,
    CF_COIN_LISTS,
    CF_LIST_LENGTHS,
    CF_TOKENS,
    CF_BRIDGE_TOKENS,
];

type ListKey = [u8; 34];

/// token ‖ shard ‖ 32-byte value
fn coin_key(token_id: &TokenId, shard: u8, value: &[u8; 32]) -> [u8; 65] {
    let mut key = [0u8; 65];
    key[..32].copy_from_slice(token_id.as_bytes());
    key[32] = shard;
    key[33..].copy_from_slice(value);
    key
}

/// token ‖ shard ‖ version
fn list_key(token_id: &TokenId, shard: u8, version: u8) -> ListKey {
    let mut key = [0u8; 34];
    key[..32].copy_from_slice(token_id.as_bytes());
    key[32] = shard;
    key[33] = version;
    key
}

/// list key ‖ big-endian index, so entries of one list sort together
fn entry_key(list: &ListKey, index: u64) -> [u8; 42] {
    let mut key = [0u8; 42];
    key[..34].copy_from_slice(list);
    key[34..].copy_from_slice(&index.to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().context("invalid u64 length")?;
    Ok(u64::from_be_bytes(arr))
}

/// Chain state persisted in RocksDB, one column family per index.
#[derive(Clone)]
pub struct RocksChainState {
    db: Arc<DB>,
}

impl RocksChainState {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("{name} CF missing"))
    }

    fn contains(&self, cf: &str, key: &[u8]) -> Result<bool> {
        Ok(self.db.get_cf(self.cf(cf)?, key)?.is_some())
    }

    fn read_index(&self, cf: &str, key: &[u8]) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_length(&self, list: &ListKey) -> Result<u64> {
        Ok(self.read_index(CF_LIST_LENGTHS, list)?.unwrap_or(0))
    }

    /// Make a token minted on another chain known.
    pub fn register_bridge_token(&self, info: &TokenInfo) -> Result<()> {
        let value = serde_json::to_vec(info)?;
        self.db
            .put_cf(self.cf(CF_BRIDGE_TOKENS)?, info.token_id.as_bytes(), value)?;
        Ok(())
    }

    /// Atomically apply everything one block writes.
    pub fn write_diff(&self, diff: &LedgerDiff) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_serials = self.cf(CF_SERIAL_NUMBERS)?;
        let cf_commitments = self.cf(CF_COMMITMENTS)?;
        let cf_otas = self.cf(CF_ONE_TIME_ADDRESSES)?;
        let cf_snds = self.cf(CF_SNDS)?;
        let cf_lists = self.cf(CF_COIN_LISTS)?;
        let cf_lengths = self.cf(CF_LIST_LENGTHS)?;
        let cf_tokens = self.cf(CF_TOKENS)?;

        for spent in &diff.spent {
            batch.put_cf(
                cf_serials,
                coin_key(&spent.token_id, spent.shard, &spent.identifier),
                b"",
            );
        }

        // lengths as they will be once earlier outputs of this block land
        let mut lengths: HashMap<ListKey, u64> = HashMap::new();
        for output in &diff.outputs {
            let list = list_key(&output.token_id, output.shard, output.version);
            let index = match lengths.get(&list) {
                Some(len) => *len,
                None => self.list_length(&list)?,
            };
            lengths.insert(list, index + 1);

            batch.put_cf(cf_lists, entry_key(&list, index), &output.entry);
            match output.ota {
                Some(ota) => batch.put_cf(
                    cf_otas,
                    coin_key(&output.token_id, output.shard, &ota),
                    index.to_be_bytes(),
                ),
                None => batch.put_cf(
                    cf_commitments,
                    coin_key(&output.token_id, output.shard, &output.commitment),
                    index.to_be_bytes(),
                ),
            }
            if let Some(snd) = output.snd {
                batch.put_cf(cf_snds, coin_key(&output.token_id, output.shard, &snd), b"");
            }
        }
        for (list, len) in &lengths {
            batch.put_cf(cf_lengths, list, len.to_be_bytes());
        }

        for token in &diff.tokens {
            let value = serde_json::to_vec(token)?;
            batch.put_cf(cf_tokens, token.token_id.as_bytes(), value);
        }

        self.db.write(batch)?;
        debug!(
            spent = diff.spent.len(),
            outputs = diff.outputs.len(),
            tokens = diff.tokens.len(),
            "ledger diff written"
        );
        Ok(())
    }
}

impl ChainState for RocksChainState {
    fn has_serial_number(&self, token_id: &TokenId, serial: &[u8; 32], shard: u8) -> Result<bool> {
        self.contains(CF_SERIAL_NUMBERS, &coin_key(token_id, shard, serial))
    }

    fn has_commitment(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<bool> {
        self.contains(CF_COMMITMENTS, &coin_key(token_id, shard, commitment))
    }

    fn has_one_time_address(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<bool> {
        self.contains(CF_ONE_TIME_ADDRESSES, &coin_key(token_id, shard, ota))
    }

    fn has_snd(&self, token_id: &TokenId, snd: &[u8; 32], shard: u8) -> Result<bool> {
        self.contains(CF_SNDS, &coin_key(token_id, shard, snd))
    }

    fn get_commitment_or_ota_by_index(
        &self,
        token_id: &TokenId,
        index: u64,
        shard: u8,
        version: u8,
    ) -> Result<Option<Vec<u8>>> {
        let key = entry_key(&list_key(token_id, shard, version), index);
        Ok(self.db.get_cf(self.cf(CF_COIN_LISTS)?, key)?)
    }

    fn get_commitment_or_ota_length(&self, token_id: &TokenId, shard: u8, version: u8) -> Result<u64> {
        self.list_length(&list_key(token_id, shard, version))
    }

    fn get_commitment_index(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<Option<u64>> {
        self.read_index(CF_COMMITMENTS, &coin_key(token_id, shard, commitment))
    }

    fn get_ota_index(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<Option<u64>> {
        self.read_index(CF_ONE_TIME_ADDRESSES, &coin_key(token_id, shard, ota))
    }

    fn token_id_exists(&self, token_id: &TokenId) -> Result<bool> {
        self.contains(CF_TOKENS, token_id.as_bytes())
    }

    fn get_all_bridge_tokens(&self) -> Result<Vec<TokenInfo>> {
        let cf = self.cf(CF_BRIDGE_TOKENS)?;
        let mut tokens = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let info: TokenInfo =
                serde_json::from_slice(&value).context("invalid bridge token record")?;
            tokens.push(info);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_privacy::{Coin, CoinV1, CoinV2, KeySet, PaymentInfo, point_to_bytes};
    use obscura_privacy::operation::random_scalar;
    use obscura_transaction::state::OutputRecord;
    use tempfile::TempDir;

    fn open() -> (TempDir, RocksChainState) {
        let dir = TempDir::new().unwrap();
        let store = RocksChainState::open(dir.path()).unwrap();
        (dir, store)
    }

    fn v2_output(token: &TokenId) -> OutputRecord {
        let asset = (!token.is_native()).then_some(token);
        let (coin, _) = CoinV2::derive(
            &PaymentInfo::new(KeySet::random().payment_address, 3),
            0,
            &random_scalar(),
            asset,
            asset.is_some(),
        );
        OutputRecord::from_coin(token, &Coin::V2(coin)).unwrap()
    }

    #[test]
    fn test_outputs_get_consecutive_indices() {
        let (_dir, store) = open();
        let mut diff = LedgerDiff::new();
        let records: Vec<_> = (0..6).map(|_| v2_output(&TokenId::NATIVE)).collect();
        diff.outputs.extend(records.iter().cloned());
        store.write_diff(&diff).unwrap();

        for record in &records {
            let ota = record.ota.unwrap();
            let index = store
                .get_ota_index(&record.token_id, &ota, record.shard)
                .unwrap()
                .unwrap();
            let entry = store
                .get_commitment_or_ota_by_index(&record.token_id, index, record.shard, 2)
                .unwrap()
                .unwrap();
            assert_eq!(entry, record.entry);
            assert!(store.has_one_time_address(&record.token_id, &ota, record.shard).unwrap());
        }
        let total: u64 = (0..8)
            .map(|shard| store.get_commitment_or_ota_length(&TokenId::NATIVE, shard, 2).unwrap())
            .sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_second_block_appends() {
        let (_dir, store) = open();
        let ks = KeySet::random();
        let coin = CoinV1::new(&ks.payment_address, 5, Vec::new());
        let shard = coin.shard();
        let record = OutputRecord::from_coin(&TokenId::NATIVE, &Coin::V1(coin.clone())).unwrap();

        let mut first = LedgerDiff::new();
        first.outputs.push(record.clone());
        store.write_diff(&first).unwrap();

        let other = CoinV1::new(&ks.payment_address, 6, Vec::new());
        let mut second = LedgerDiff::new();
        second
            .outputs
            .push(OutputRecord::from_coin(&TokenId::NATIVE, &Coin::V1(other.clone())).unwrap());
        store.write_diff(&second).unwrap();

        assert_eq!(store.get_commitment_or_ota_length(&TokenId::NATIVE, shard, 1).unwrap(), 2);
        assert_eq!(
            store
                .get_commitment_index(&TokenId::NATIVE, &point_to_bytes(&other.commitment), shard)
                .unwrap(),
            Some(1)
        );
        assert!(store
            .has_commitment(&TokenId::NATIVE, &point_to_bytes(&coin.commitment), shard)
            .unwrap());
        assert!(store.has_snd(&TokenId::NATIVE, &record.snd.unwrap(), shard).unwrap());
    }

    #[test]
    fn test_tokens_and_bridge_tokens() {
        let (_dir, store) = open();
        let info = TokenInfo {
            token_id: TokenId([3; 32]),
            name: "Gold".into(),
            symbol: "GLD".into(),
            amount: 10,
            mintable: false,
        };
        assert!(!store.token_id_exists(&info.token_id).unwrap());
        let mut diff = LedgerDiff::new();
        diff.record_token(info.clone());
        store.write_diff(&diff).unwrap();
        assert!(store.token_id_exists(&info.token_id).unwrap());

        let bridged = TokenInfo {
            token_id: TokenId([4; 32]),
            mintable: true,
            ..info
        };
        store.register_bridge_token(&bridged).unwrap();
        assert_eq!(store.get_all_bridge_tokens().unwrap(), vec![bridged]);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let dir = TempDir::new().unwrap();
        let record = v2_output(&TokenId([9; 32]));
        {
            let store = RocksChainState::open(dir.path()).unwrap();
            let mut diff = LedgerDiff::new();
            diff.outputs.push(record.clone());
            store.write_diff(&diff).unwrap();
        }
        let store = RocksChainState::open(dir.path()).unwrap();
        assert_eq!(record.token_id, TokenId::CONFIDENTIAL_ASSET);
        assert_eq!(
            store
                .get_commitment_or_ota_length(&TokenId::CONFIDENTIAL_ASSET, record.shard, 2)
                .unwrap(),
            1
        );
    }
}
