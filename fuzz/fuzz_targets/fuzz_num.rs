#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any decoded number re-encodes to the bytes it was read from
    if let Some((value, len)) = xftx::utils::decode_num(data) {
        let mut buf = Vec::new();
        xftx::utils::encode_num(value, &mut buf);
        assert_eq!(buf.len(), xftx::utils::num_len(value));
        if buf.len() == len {
            assert_eq!(&buf[..], &data[..len]);
        }
    }
    let _ = xftx::utils::read_num(&mut &data[..]);
});
