#![no_main]

use connect_four_client::{Dispatcher, Field, Player, Renderer, Role};
use libfuzzer_sys::fuzz_target;

struct Discard;

impl Renderer for Discard {
    fn set_join_link(&mut self, _href: &str) {}
    fn set_watch_link(&mut self, _href: &str) {}
    fn apply_move(&mut self, _player: &Player, _column: &Field, _row: &Field) {}
    fn announce(&mut self, _message: &str) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut dispatcher = Dispatcher::new(Role::Initiator, Discard);
    let _ = dispatcher.on_open();

    // One frame per line. Once terminated, every further frame is refused.
    // A frame with a known tag never terminates on its payload alone.
    for frame in text.lines() {
        let was_terminated = dispatcher.is_terminated();
        let known = connect_four_client::protocol::decode(frame).is_ok();
        let result = dispatcher.on_message(frame);
        if was_terminated {
            assert!(result.is_err());
        } else if known {
            assert!(result.is_ok());
        }
    }
});
