#![no_main]

use connect_four_client::protocol::{decode, decode_command, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding never panics, whatever the frame.
    let _ = decode(frame);

    // Anything the server-side parser accepts must encode back to an equal command.
    if let Ok(command) = decode_command(frame) {
        let again = encode(&command).expect("encode");
        assert_eq!(decode_command(&again).expect("re-decode"), command);
    }
});
