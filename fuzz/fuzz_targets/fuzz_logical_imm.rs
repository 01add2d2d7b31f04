#![no_main]
use libfuzzer_sys::fuzz_target;
use risc_asm::bitmask::{decode_logical_imm, encode_logical_imm, LogicalImmediateTable};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[..8]);
    let value = u64::from_le_bytes(raw);

    let table = LogicalImmediateTable::get();
    match encode_logical_imm(value, true) {
        Ok(field) => {
            let decoded =
                decode_logical_imm((field >> 22) & 1, (field >> 16) & 0x3F, (field >> 10) & 0x3F);
            assert_eq!(decoded, Some(value));
        }
        Err(_) => assert!(table.lookup64(value).is_none()),
    }

    let low = value as u32;
    if let Ok(field) = encode_logical_imm(low as u64, false) {
        assert_eq!(field & (1 << 22), 0);
    }
});
