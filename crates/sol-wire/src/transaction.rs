//! Solana legacy transaction wire format, multi-signer signing and parsing.
//!
//! Transactions are assembled by hand, no `solana-sdk` dependency. Layout:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use crate::error::SolError;
use crate::keypair::{Signature, Signer, SIGNATURE_BYTES};
use crate::pubkey::Pubkey;

/// Largest serialized transaction the network accepts (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError("unexpected end of data while decoding compact-u16".into())
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(SolError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable,
        }
    }

    pub fn writable_signer(pubkey: Pubkey) -> Self {
        Self::new(pubkey, true, true)
    }

    pub fn readonly_signer(pubkey: Pubkey) -> Self {
        Self::new(pubkey, true, false)
    }

    pub fn writable(pubkey: Pubkey) -> Self {
        Self::new(pubkey, false, true)
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        Self::new(pubkey, false, false)
    }
}

/// A Solana instruction (before it is compiled into a transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    /// All account keys referenced by this transaction, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Pubkey>,

    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,

    pub recent_blockhash: [u8; 32],

    /// Compiled instructions (account references replaced with indices).
    pub compiled_instructions: Vec<CompiledInstruction>,
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the transaction's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A message together with one signature per required signer.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signatures: Vec<Signature>,
    pub message: Vec<u8>,
}

impl SignedTransaction {
    /// The fee payer's signature, which is also the transaction id.
    pub fn signature(&self) -> Signature {
        self.signatures.first().copied().unwrap_or_default()
    }

    /// Serialize into the wire format accepted by `sendTransaction`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire =
            Vec::with_capacity(3 + self.signatures.len() * SIGNATURE_BYTES + self.message.len());
        wire.extend_from_slice(&encode_compact_u16(self.signatures.len() as u16));
        for sig in &self.signatures {
            wire.extend_from_slice(&sig.to_bytes());
        }
        wire.extend_from_slice(&self.message);
        wire
    }
}

impl SolTransaction {
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// Whether the account at `index` is a signer.
    pub fn is_signer(&self, index: usize) -> bool {
        index < self.num_required_signatures as usize
    }

    /// Whether the account at `index` is writable, according to the header.
    pub fn is_writable(&self, index: usize) -> bool {
        let num_signed = self.num_required_signatures as usize;
        if index < num_signed {
            index < num_signed.saturating_sub(self.num_readonly_signed as usize)
        } else {
            index
                < self
                    .account_keys
                    .len()
                    .saturating_sub(self.num_readonly_unsigned as usize)
        }
    }

    /// Rebuild instructions with full account metas from the compiled form.
    pub fn decompile(&self) -> Result<Vec<SolInstruction>, SolError> {
        let key_at = |idx: u8| {
            self.account_keys.get(idx as usize).copied().ok_or_else(|| {
                SolError::SerializationError(format!("account index {idx} out of range"))
            })
        };

        self.compiled_instructions
            .iter()
            .map(|cix| {
                let accounts = cix
                    .account_indices
                    .iter()
                    .map(|&idx| {
                        Ok(SolAccountMeta::new(
                            key_at(idx)?,
                            self.is_signer(idx as usize),
                            self.is_writable(idx as usize),
                        ))
                    })
                    .collect::<Result<Vec<_>, SolError>>()?;
                Ok(SolInstruction {
                    program_id: key_at(cix.program_id_index)?,
                    accounts,
                    data: cix.data.clone(),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Transaction building
// ---------------------------------------------------------------------------

/// Build a transaction from a set of instructions with a single fee payer.
///
/// The fee payer is always the first signer and is placed at index 0 in the
/// account keys.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &Pubkey,
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    if instructions.is_empty() {
        return Err(SolError::TransactionBuildError("no instructions".into()));
    }

    // Instruction account lists are tiny, a Vec keeps insertion order for free.
    struct AccountEntry {
        pubkey: Pubkey,
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: Pubkey, signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    // Fee payer is always signer + writable.
    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        // Program IDs are non-signer, read-only accounts.
        upsert(ix.program_id, false, false);
    }

    // Stable sort: within a category insertion order wins, so the fee payer
    // (inserted first, writable signer) stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    if entries.len() > u8::MAX as usize + 1 {
        return Err(SolError::TransactionBuildError(format!(
            "{} accounts exceed the 256 account limit",
            entries.len()
        )));
    }

    let count = |f: fn(&AccountEntry) -> bool| entries.iter().filter(|e| f(e)).count() as u8;
    let num_signers = count(|e| e.is_signer);
    let num_readonly_signed = count(|e| e.is_signer && !e.is_writable);
    let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

    let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &Pubkey| {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SolError::TransactionBuildError(format!("{key} not in account keys")))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey))
            .collect::<Result<Vec<u8>, SolError>>()?;

        compiled.push(CompiledInstruction {
            program_id_index: index_of(&ix.program_id)?,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(SolTransaction {
        account_keys,
        num_required_signatures: num_signers,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &SolTransaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(tx.account_keys.len() as u16));
    for key in &tx.account_keys {
        buf.extend_from_slice(key.as_ref());
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(tx.compiled_instructions.len() as u16));
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);

        buf.extend_from_slice(&encode_compact_u16(ix.account_indices.len() as u16));
        buf.extend_from_slice(&ix.account_indices);

        buf.extend_from_slice(&encode_compact_u16(ix.data.len() as u16));
        buf.extend_from_slice(&ix.data);
    }

    buf
}

/// Sign a compiled transaction with every required signer.
///
/// Each signer key of the message must be covered by one of `signers`;
/// signers the message does not reference are ignored. Fails when the result
/// would exceed [`PACKET_DATA_SIZE`].
pub fn sign_transaction(
    tx: &SolTransaction,
    signers: &[&dyn Signer],
) -> Result<SignedTransaction, SolError> {
    let message = serialize_message(tx);

    let mut signatures = Vec::with_capacity(tx.num_required_signatures as usize);
    for key in tx.signer_keys() {
        let signer = signers
            .iter()
            .find(|s| s.pubkey() == *key)
            .ok_or_else(|| SolError::SigningError(format!("missing signature for {key}")))?;
        signatures.push(signer.try_sign_message(&message)?);
    }

    let signed = SignedTransaction {
        signatures,
        message,
    };

    let size = signed.to_wire().len();
    if size > PACKET_DATA_SIZE {
        return Err(SolError::TransactionBuildError(format!(
            "transaction is {size} bytes, limit is {PACKET_DATA_SIZE}"
        )));
    }

    Ok(signed)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn take<'a>(data: &'a [u8], offset: &mut usize, len: usize, what: &str) -> Result<&'a [u8], SolError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| SolError::SerializationError(format!("transaction too short for {what}")))?;
    let out = &data[*offset..end];
    *offset = end;
    Ok(out)
}

fn take_compact(data: &[u8], offset: &mut usize) -> Result<usize, SolError> {
    let (value, used) = decode_compact_u16(&data[(*offset).min(data.len())..])?;
    *offset += used;
    Ok(value as usize)
}

/// Parse a wire-format transaction into its signatures and message.
pub fn parse_wire_transaction(raw: &[u8]) -> Result<(Vec<Signature>, SolTransaction), SolError> {
    let mut offset = 0usize;

    let num_sigs = take_compact(raw, &mut offset)?;
    let mut signatures = Vec::with_capacity(num_sigs);
    for _ in 0..num_sigs {
        let bytes = take(raw, &mut offset, SIGNATURE_BYTES, "signatures")?;
        let mut arr = [0u8; SIGNATURE_BYTES];
        arr.copy_from_slice(bytes);
        signatures.push(Signature::new_from_array(arr));
    }

    let header = take(raw, &mut offset, 3, "message header")?;
    let (num_required_signatures, num_readonly_signed, num_readonly_unsigned) =
        (header[0], header[1], header[2]);

    let num_accounts = take_compact(raw, &mut offset)?;
    let mut account_keys = Vec::with_capacity(num_accounts);
    for _ in 0..num_accounts {
        account_keys.push(Pubkey::try_from_slice(take(raw, &mut offset, 32, "account keys")?)?);
    }

    let mut recent_blockhash = [0u8; 32];
    recent_blockhash.copy_from_slice(take(raw, &mut offset, 32, "blockhash")?);

    let num_instructions = take_compact(raw, &mut offset)?;
    let mut compiled_instructions = Vec::with_capacity(num_instructions);
    for _ in 0..num_instructions {
        let program_id_index = take(raw, &mut offset, 1, "program index")?[0];
        let n = take_compact(raw, &mut offset)?;
        let account_indices = take(raw, &mut offset, n, "account indices")?.to_vec();
        let len = take_compact(raw, &mut offset)?;
        let data = take(raw, &mut offset, len, "instruction data")?.to_vec();
        compiled_instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    if signatures.len() != num_required_signatures as usize {
        return Err(SolError::SerializationError(format!(
            "{} signatures for {} required signers",
            signatures.len(),
            num_required_signatures
        )));
    }

    Ok((
        signatures,
        SolTransaction {
            account_keys,
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            compiled_instructions,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use crate::system::{transfer, SYSTEM_PROGRAM_ID};

    // -- compact-u16 encoding -----------------------------------------------

    #[test]
    fn compact_u16_zero() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
    }

    #[test]
    fn compact_u16_boundary_128() {
        // 128 = 0x80 -> two bytes: (0x00 | 0x80), 0x01
        assert_eq!(encode_compact_u16(128), vec![0x80, 0x01]);
    }

    #[test]
    fn compact_u16_boundary_16384() {
        assert_eq!(encode_compact_u16(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn compact_u16_max_value() {
        assert_eq!(encode_compact_u16(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn decode_compact_u16_values() {
        for value in [0u16, 1, 127, 128, 300, 16383, 16384, u16::MAX] {
            let encoded = encode_compact_u16(value);
            assert_eq!(decode_compact_u16(&encoded).unwrap(), (value, encoded.len()));
        }
    }

    #[test]
    fn decode_compact_u16_truncated() {
        assert!(decode_compact_u16(&[]).is_err());
        assert!(decode_compact_u16(&[0x80]).is_err());
    }

    // -- Transaction compilation -------------------------------------------

    fn key(b: u8) -> Pubkey {
        Pubkey::new_from_array([b; 32])
    }

    #[test]
    fn compiled_transaction_account_order() {
        let from = key(1);
        let to = key(2);
        let tx = compile_transaction(&[transfer(&from, &to, 1000)], &from, &[0xAA; 32]).unwrap();

        // from (signer+writable), to (writable), system program (read-only)
        assert_eq!(tx.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(tx.num_required_signatures, 1);
        assert_eq!(tx.num_readonly_signed, 0);
        assert_eq!(tx.num_readonly_unsigned, 1);
    }

    #[test]
    fn fee_payer_is_first_even_if_not_referenced() {
        let payer = key(9);
        let from = key(1);
        let tx = compile_transaction(&[transfer(&from, &key(2), 1)], &payer, &[0; 32]).unwrap();

        assert_eq!(tx.account_keys[0], payer);
        assert_eq!(tx.num_required_signatures, 2);
        assert_eq!(tx.signer_keys(), &[payer, from]);
    }

    #[test]
    fn permissions_are_merged_across_instructions() {
        let payer = key(1);
        let shared = key(5);
        let ixs = vec![
            SolInstruction {
                program_id: key(7),
                accounts: vec![SolAccountMeta::readonly(shared)],
                data: vec![],
            },
            SolInstruction {
                program_id: key(7),
                accounts: vec![SolAccountMeta::writable(shared)],
                data: vec![],
            },
        ];
        let tx = compile_transaction(&ixs, &payer, &[0; 32]).unwrap();
        let idx = tx.account_keys.iter().position(|k| *k == shared).unwrap();
        assert!(tx.is_writable(idx));
        assert!(!tx.is_signer(idx));
    }

    #[test]
    fn empty_instruction_list_fails() {
        assert!(compile_transaction(&[], &key(1), &[0; 32]).is_err());
    }

    // -- Message serialization ---------------------------------------------

    #[test]
    fn serialize_message_contains_blockhash() {
        let from = key(1);
        let blockhash = [0xCCu8; 32];
        let tx = compile_transaction(&[transfer(&from, &key(2), 500)], &from, &blockhash).unwrap();
        let msg = serialize_message(&tx);

        assert_eq!(msg[0], tx.num_required_signatures);
        let num_accounts = tx.account_keys.len();
        let offset = 3 + encode_compact_u16(num_accounts as u16).len() + 32 * num_accounts;
        assert_eq!(&msg[offset..offset + 32], &blockhash);
    }

    // -- Signing ------------------------------------------------------------

    #[test]
    fn multi_signer_transaction_signs_in_key_order() {
        let payer = Keypair::generate();
        let from = Keypair::generate();
        let tx = compile_transaction(
            &[transfer(&from.pubkey(), &key(2), 10)],
            &payer.pubkey(),
            &[3; 32],
        )
        .unwrap();

        // Order of the signer slice does not matter.
        let signed = sign_transaction(&tx, &[&from, &payer]).unwrap();
        assert_eq!(signed.signatures.len(), 2);
        assert!(signed.signatures[0].verify(&payer.pubkey(), &signed.message));
        assert!(signed.signatures[1].verify(&from.pubkey(), &signed.message));
        assert_eq!(signed.signature(), signed.signatures[0]);
    }

    #[test]
    fn missing_signer_fails() {
        let payer = Keypair::generate();
        let from = Keypair::generate();
        let tx = compile_transaction(
            &[transfer(&from.pubkey(), &key(2), 10)],
            &payer.pubkey(),
            &[3; 32],
        )
        .unwrap();

        let err = sign_transaction(&tx, &[&payer]).unwrap_err();
        assert!(matches!(err, SolError::SigningError(_)));
    }

    #[test]
    fn extra_signers_are_ignored() {
        let payer = Keypair::generate();
        let stranger = Keypair::generate();
        let tx = compile_transaction(&[transfer(&payer.pubkey(), &key(2), 10)], &payer.pubkey(), &[0; 32])
            .unwrap();
        let signed = sign_transaction(&tx, &[&stranger, &payer]).unwrap();
        assert_eq!(signed.signatures.len(), 1);
    }

    #[test]
    fn oversized_transaction_is_rejected() {
        let payer = Keypair::generate();
        let ix = SolInstruction {
            program_id: key(7),
            accounts: vec![],
            data: vec![0u8; PACKET_DATA_SIZE],
        };
        let tx = compile_transaction(&[ix], &payer.pubkey(), &[0; 32]).unwrap();
        assert!(matches!(
            sign_transaction(&tx, &[&payer]),
            Err(SolError::TransactionBuildError(_))
        ));
    }

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn parse_wire_restores_message_and_instructions() {
        let payer = Keypair::generate();
        let to = key(2);
        let instructions = vec![transfer(&payer.pubkey(), &to, 77)];
        let tx = compile_transaction(&instructions, &payer.pubkey(), &[5; 32]).unwrap();
        let signed = sign_transaction(&tx, &[&payer]).unwrap();

        let (signatures, parsed) = parse_wire_transaction(&signed.to_wire()).unwrap();

        assert_eq!(signatures, signed.signatures);
        assert_eq!(parsed, tx);
        assert_eq!(parsed.decompile().unwrap(), instructions);
    }

    #[test]
    fn parse_truncated_transaction_fails() {
        let payer = Keypair::generate();
        let tx = compile_transaction(&[transfer(&payer.pubkey(), &key(2), 1)], &payer.pubkey(), &[0; 32])
            .unwrap();
        let wire = sign_transaction(&tx, &[&payer]).unwrap().to_wire();

        assert!(parse_wire_transaction(&wire[..wire.len() - 4]).is_err());
        assert!(parse_wire_transaction(&wire[..40]).is_err());
    }
}
