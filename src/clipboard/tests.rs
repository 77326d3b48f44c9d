// src/clipboard/tests.rs

use std::sync::Arc;

use test_log::test;

use super::format::{FormatId, CF_DIB, CF_OEMTEXT, CF_TEXT, CF_UNICODETEXT, INVALID_FORMAT};
use super::messages::{Message, RecordingMessages};
use super::session::ContextId;
use super::text;
use super::{Clipboard, ClipboardService};
use crate::config::SelectionConfig;
use crate::error::ClipboardError;
use crate::host::mock::{FakeGraphics, FakeHost, FakeServer};
use crate::host::NONE;

const APP: ContextId = ContextId(1);
const OTHER: ContextId = ContextId(2);
const VIEWER: ContextId = ContextId(3);

struct Fixture {
    server: FakeServer,
    messages: Arc<RecordingMessages>,
    clipboard: Clipboard<FakeHost>,
}

fn fixture() -> Fixture {
    let server = FakeServer::new();
    let messages = Arc::new(RecordingMessages::default());
    let service = ClipboardService::with_collaborators(
        SelectionConfig::default(),
        messages.clone(),
        Arc::new(FakeGraphics::default()),
    );
    let clipboard = service.attach(server.connect()).unwrap();
    Fixture {
        server,
        messages,
        clipboard,
    }
}

/// Opens as `ctx`, empties and stores each `(format, bytes)`, then closes.
fn publish(clipboard: &Clipboard<FakeHost>, ctx: ContextId, formats: &[(FormatId, Option<Vec<u8>>)]) {
    clipboard.open(ctx).unwrap();
    clipboard.empty().unwrap();
    for (id, data) in formats {
        clipboard.set_data(*id, data.clone()).unwrap();
    }
    clipboard.close().unwrap();
}

#[test]
fn it_should_register_formats_whether_or_not_open() {
    let f = fixture();
    let closed = f.clipboard.register_format("Rich Text Format").unwrap();
    f.clipboard.open(APP).unwrap();
    let open = f.clipboard.register_format("Rich Text Format").unwrap();
    assert_eq!(closed, open);
    assert_eq!(f.clipboard.format_name(open).as_deref(), Some("Rich Text Format"));
    assert_eq!(f.clipboard.register_format(""), Err(ClipboardError::InvalidFormatName));
}

#[test]
fn it_should_return_stored_data_unchanged_within_a_bracket() {
    let f = fixture();
    let dib = vec![40u8, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0xFF];
    f.clipboard.open(APP).unwrap();
    f.clipboard.empty().unwrap();
    f.clipboard.set_data(CF_DIB, Some(dib.clone())).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_DIB).unwrap()[..], &dib[..]);
    f.clipboard.close().unwrap();
}

#[test]
fn it_should_synthesize_oem_text_and_recompute_after_changes() {
    let f = fixture();
    f.clipboard.open(APP).unwrap();
    f.clipboard.empty().unwrap();
    f.clipboard.set_data(CF_TEXT, Some(vec![b'c', b'a', b'f', 0xE9, 0])).unwrap();

    let oem = f.clipboard.get_data(CF_OEMTEXT).unwrap();
    assert_eq!(&oem[..], &[b'c', b'a', b'f', 0x82, 0]);

    f.clipboard.set_data(CF_TEXT, Some(b"new\0".to_vec())).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_OEMTEXT).unwrap()[..], b"new\0");

    f.clipboard.set_data(CF_OEMTEXT, Some(vec![0x82, 0])).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_OEMTEXT).unwrap()[..], &[0x82, 0]);
    assert_eq!(&f.clipboard.get_data(CF_TEXT).unwrap()[..], b"new\0");
    f.clipboard.close().unwrap();
}

#[test]
fn it_should_empty_idempotently() {
    let f = fixture();
    f.clipboard.open(APP).unwrap();
    f.clipboard.empty().unwrap();
    f.clipboard.set_data(CF_TEXT, Some(b"x\0".to_vec())).unwrap();
    f.clipboard.empty().unwrap();
    f.clipboard.empty().unwrap();
    assert_eq!(f.clipboard.count_formats(), Ok(0));
    assert_eq!(f.clipboard.get_data(CF_TEXT), Err(ClipboardError::FormatAbsent(CF_TEXT)));
    assert_eq!(f.clipboard.enum_formats(0), Ok(INVALID_FORMAT));
    f.clipboard.close().unwrap();
}

#[test]
fn it_should_reject_conflicting_opens_without_changing_state() {
    let f = fixture();
    f.clipboard.open(OTHER).unwrap();
    assert_eq!(f.clipboard.open(APP), Err(ClipboardError::AlreadyOpen { holder: OTHER }));
    assert_eq!(f.clipboard.open(OTHER), Err(ClipboardError::AlreadyOpen { holder: OTHER }));
    assert_eq!(f.clipboard.open_by(), Some(OTHER));
    f.clipboard.close().unwrap();
    assert_eq!(f.clipboard.open_by(), None);
    assert_eq!(f.clipboard.close(), Err(ClipboardError::NotOpen));
}

#[test]
fn it_should_refuse_writes_without_ownership() {
    let f = fixture();
    let clipboard_atom = f.server.intern("CLIPBOARD");
    assert_eq!(
        f.clipboard.set_data(CF_TEXT, Some(b"x\0".to_vec())),
        Err(ClipboardError::NotOpen)
    );
    f.clipboard.open(APP).unwrap();
    assert_eq!(
        f.clipboard.set_data(CF_TEXT, Some(b"x\0".to_vec())),
        Err(ClipboardError::NotOwned)
    );
    assert_eq!(f.server.selection_owner(clipboard_atom), NONE);
    assert!(!f.clipboard.owns_selection());
    f.clipboard.close().unwrap();
}

#[test]
fn it_should_claim_selections_when_data_is_supplied() {
    let f = fixture();
    let clipboard_atom = f.server.intern("CLIPBOARD");
    let primary_atom = f.server.intern("PRIMARY");
    let window = f.clipboard.host().window();

    f.clipboard.open(APP).unwrap();
    f.clipboard.empty().unwrap();
    assert_eq!(f.server.selection_owner(clipboard_atom), NONE);
    f.clipboard.set_data(CF_TEXT, Some(b"x\0".to_vec())).unwrap();
    assert_eq!(f.server.selection_owner(clipboard_atom), window);
    assert_eq!(f.server.selection_owner(primary_atom), window);
    f.clipboard.close().unwrap();
    assert!(f.clipboard.owns_selection());
}

#[test]
fn it_should_claim_only_the_clipboard_without_primary() {
    let server = FakeServer::new();
    let config = SelectionConfig {
        use_primary: false,
        ..SelectionConfig::default()
    };
    let clipboard = ClipboardService::new(config).attach(server.connect()).unwrap();
    publish(&clipboard, APP, &[(CF_TEXT, Some(b"x\0".to_vec()))]);
    assert_eq!(server.selection_owner(server.intern("CLIPBOARD")), clipboard.host().window());
    assert_eq!(server.selection_owner(server.intern("PRIMARY")), NONE);
}

#[test]
fn it_should_release_claims_when_a_bracket_leaves_the_clipboard_empty() {
    let f = fixture();
    let clipboard_atom = f.server.intern("CLIPBOARD");
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"x\0".to_vec()))]);
    assert!(f.clipboard.owns_selection());

    publish(&f.clipboard, APP, &[]);
    assert!(!f.clipboard.owns_selection());
    assert_eq!(f.server.selection_owner(clipboard_atom), NONE);
}

#[test]
fn it_should_notify_the_previous_owner_only() {
    let f = fixture();
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"x\0".to_vec()))]);
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"y\0".to_vec()))]);
    assert!(f.messages.messages().is_empty());

    publish(&f.clipboard, OTHER, &[(CF_TEXT, Some(b"z\0".to_vec()))]);
    assert_eq!(f.messages.messages(), vec![Message::Destroy(APP)]);
    assert_eq!(f.clipboard.owner(), Some(OTHER));
}

#[test]
fn it_should_notify_the_viewer_after_close() {
    let f = fixture();
    assert_eq!(f.clipboard.set_viewer(Some(VIEWER)), None);

    f.clipboard.open(APP).unwrap();
    f.clipboard.close().unwrap();
    assert!(f.messages.messages().is_empty());

    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"x\0".to_vec()))]);
    assert_eq!(f.messages.messages(), vec![Message::Draw(VIEWER)]);

    assert!(f.clipboard.change_viewer_chain(VIEWER, None));
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"y\0".to_vec()))]);
    assert_eq!(f.messages.messages(), vec![Message::Draw(VIEWER)]);
}

#[test]
fn it_should_render_delayed_formats_once_on_demand() {
    let f = fixture();
    let wide = text::string_to_utf16le("later");
    f.messages.will_render(CF_UNICODETEXT, &wide);
    publish(&f.clipboard, APP, &[(CF_UNICODETEXT, None)]);

    f.clipboard.open(OTHER).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_UNICODETEXT).unwrap()[..], &wide[..]);
    assert_eq!(&f.clipboard.get_data(CF_UNICODETEXT).unwrap()[..], &wide[..]);
    f.clipboard.close().unwrap();

    assert_eq!(f.messages.messages(), vec![Message::Render(APP, CF_UNICODETEXT)]);
}

#[test]
fn it_should_report_absent_when_the_owner_cannot_render() {
    let f = fixture();
    publish(&f.clipboard, APP, &[(CF_DIB, None)]);
    f.clipboard.open(OTHER).unwrap();
    assert_eq!(f.clipboard.get_data(CF_DIB), Err(ClipboardError::FormatAbsent(CF_DIB)));
    f.clipboard.close().unwrap();
    assert_eq!(f.messages.messages(), vec![Message::Render(APP, CF_DIB)]);
}

#[test]
fn it_should_synthesize_from_a_delayed_partner() {
    let f = fixture();
    f.messages.will_render(CF_TEXT, &[0xE9, 0]);
    publish(&f.clipboard, APP, &[(CF_TEXT, None)]);
    f.clipboard.open(OTHER).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_OEMTEXT).unwrap()[..], &[0x82, 0]);
    f.clipboard.close().unwrap();
    assert_eq!(f.messages.messages(), vec![Message::Render(APP, CF_TEXT)]);
}

#[test]
fn it_should_render_all_delayed_formats() {
    let f = fixture();
    f.messages.will_render(CF_TEXT, b"a\0");
    f.messages.will_render(CF_DIB, &[1, 2]);
    publish(&f.clipboard, APP, &[(CF_TEXT, None), (CF_DIB, None), (CF_UNICODETEXT, Some(vec![0, 0]))]);

    assert_eq!(f.clipboard.render_all(), 2);
    assert_eq!(f.clipboard.render_all(), 0);

    f.clipboard.open(OTHER).unwrap();
    assert_eq!(&f.clipboard.get_data(CF_DIB).unwrap()[..], &[1, 2]);
    f.clipboard.close().unwrap();
    assert_eq!(
        f.messages.messages(),
        vec![Message::Render(APP, CF_TEXT), Message::Render(APP, CF_DIB)]
    );
}

#[test]
fn it_should_count_what_an_enumeration_walks() {
    let f = fixture();
    let rtf = f.clipboard.register_format("Rich Text Format").unwrap();
    publish(
        &f.clipboard,
        APP,
        &[
            (CF_UNICODETEXT, Some(vec![b'a', 0, 0, 0])),
            (CF_TEXT, Some(b"a\0".to_vec())),
            (CF_DIB, Some(vec![0; 4])),
            (rtf, Some(b"{\\rtf1}".to_vec())),
        ],
    );

    f.clipboard.open(APP).unwrap();
    let mut walked = Vec::new();
    let mut id = f.clipboard.enum_formats(0).unwrap();
    while id != INVALID_FORMAT {
        walked.push(id);
        id = f.clipboard.enum_formats(id).unwrap();
    }
    f.clipboard.close().unwrap();

    assert_eq!(f.clipboard.count_formats(), Ok(walked.len()));
    assert_eq!(walked, vec![CF_UNICODETEXT, CF_TEXT, CF_DIB, rtf, CF_OEMTEXT]);
}

#[test]
fn it_should_not_double_count_a_text_pair_set_directly() {
    let f = fixture();
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"a\0".to_vec())), (CF_OEMTEXT, Some(b"a\0".to_vec()))]);
    assert_eq!(f.clipboard.count_formats(), Ok(2));
}

#[test]
fn it_should_require_an_open_bracket_for_reads() {
    let f = fixture();
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"a\0".to_vec()))]);
    assert_eq!(f.clipboard.get_data(CF_TEXT), Err(ClipboardError::NotOpen));
    assert_eq!(f.clipboard.enum_formats(0), Err(ClipboardError::NotOpen));
    assert!(f.clipboard.is_format_available(CF_TEXT));
    assert!(f.clipboard.is_format_available(CF_OEMTEXT));
    assert!(!f.clipboard.is_format_available(CF_DIB));
    assert!(!f.clipboard.is_format_available(INVALID_FORMAT));
}

#[test]
fn it_should_bump_the_sequence_number_on_every_empty() {
    let f = fixture();
    let start = f.clipboard.sequence_number();
    publish(&f.clipboard, APP, &[(CF_TEXT, Some(b"a\0".to_vec()))]);
    publish(&f.clipboard, APP, &[]);
    assert_eq!(f.clipboard.sequence_number(), start + 2);
}

#[test]
fn it_should_share_state_between_connections_of_one_service() {
    let server = FakeServer::new();
    let service = ClipboardService::new(SelectionConfig::default());
    let first = service.attach(server.connect()).unwrap();
    let second = service.attach(server.connect()).unwrap();

    publish(&first, APP, &[(CF_TEXT, Some(b"shared\0".to_vec()))]);
    second.open(OTHER).unwrap();
    assert_eq!(&second.get_data(CF_TEXT).unwrap()[..], b"shared\0");
    assert_eq!(second.open(APP), Err(ClipboardError::AlreadyOpen { holder: OTHER }));
    second.close().unwrap();
    assert!(second.owns_selection());
}
