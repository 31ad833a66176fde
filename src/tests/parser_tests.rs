use crate::completion::parser::FrameParser;

const HELLO_STREAM: &[u8] = concat!(
    "data: {\"content\":\"H\u{e9}l\"}\n",
    "data: {\"content\":\"lo\"}\n",
    "data: {\"content\":\"\",\"stop\":true}\n",
)
.as_bytes();

#[test]
fn whole_response_as_one_chunk() {
    let mut parser = FrameParser::new();
    let deltas = parser.push_chunk(HELLO_STREAM).unwrap();

    assert_eq!(deltas.len(), 3);
    assert_eq!(parser.accumulated(), "Héllo");
    assert!(parser.is_finished());
    assert!(deltas[2].stop);
}

#[test]
fn chunk_boundaries_do_not_change_the_result() {
    // Any split of the byte stream, including mid-line and inside the
    // two-byte 'é', must accumulate the same content as a single chunk.
    for chunk_size in 1..=HELLO_STREAM.len() {
        let mut parser = FrameParser::new();
        let mut all_deltas = Vec::new();

        for chunk in HELLO_STREAM.chunks(chunk_size) {
            all_deltas.extend(parser.push_chunk(chunk).unwrap());
        }

        assert_eq!(parser.accumulated(), "Héllo", "chunk size {}", chunk_size);
        assert!(parser.is_finished(), "chunk size {}", chunk_size);
        assert_eq!(all_deltas.len(), 3, "chunk size {}", chunk_size);
    }
}

#[test]
fn multibyte_character_split_across_chunks_stays_buffered() {
    let mut parser = FrameParser::new();

    // 'é' is 0xC3 0xA9; the chunk boundary lands between its bytes.
    let deltas = parser.push_chunk(b"data: {\"content\":\"h\xC3").unwrap();
    assert!(deltas.is_empty());

    let deltas = parser.push_chunk(b"\xA9llo\"}\n").unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "héllo");
}

#[test]
fn partial_line_stays_buffered_until_completed() {
    let mut parser = FrameParser::new();

    let deltas = parser.push_chunk(b"data: {\"content\":\"Hel").unwrap();
    assert!(deltas.is_empty());
    assert_eq!(parser.accumulated(), "");

    let deltas = parser.push_chunk(b"lo\"}\n").unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "Hello");
    assert!(!parser.is_finished());
}

#[test]
fn stop_flag_terminates_and_later_input_is_ignored() {
    let mut parser = FrameParser::new();
    parser
        .push_chunk(b"data: {\"content\":\"a\",\"stop\":true}\n")
        .unwrap();
    assert!(parser.is_finished());

    let deltas = parser.push_chunk(b"data: {\"content\":\"b\"}\n").unwrap();
    assert!(deltas.is_empty());
    assert_eq!(parser.accumulated(), "a");
}

#[test]
fn slot_unavailable_is_a_distinguished_error() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(b"error: {\"content\":\"slot unavailable\"}\n")
        .unwrap();
    assert!(deltas.is_empty());
    assert!(parser.is_finished());

    let err = parser.take_error().unwrap();
    assert!(err.is_slot_unavailable());
    assert!(err.is_stream_protocol());
    assert!(!err.is_cancelled());
}

#[test]
fn deltas_ahead_of_a_slot_error_in_the_same_chunk_are_kept() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(b"data: {\"content\":\"par\"}\nerror: {\"content\":\"slot unavailable\"}\n")
        .unwrap();

    // The decoded delta is handed back; the error waits its turn.
    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "par");
    assert!(parser.take_error().unwrap().is_slot_unavailable());
}

#[test]
fn other_error_frames_are_logged_but_not_fatal() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(b"error: {\"content\":\"out of memory\"}\ndata: {\"content\":\"x\"}\n")
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "x");
    assert!(parser.take_error().is_none());
}

#[test]
fn invalid_utf8_in_a_completed_line_is_a_protocol_error() {
    let mut parser = FrameParser::new();
    // 0xC3 with no continuation byte, terminated by the newline.
    let err = parser.push_chunk(b"data: {\"content\":\"\xC3\"}\n").unwrap_err();
    assert!(err.is_stream_protocol());
}

#[test]
fn non_matching_lines_are_skipped() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(b"\nping\n: keep-alive\nbad key: value\ndata: {\"content\":\"ok\"}\n")
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "ok");
}

#[test]
fn undecodable_data_frame_is_skipped() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(b"data: not json\ndata: {\"content\":\"ok\"}\n")
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(parser.accumulated(), "ok");
}

#[test]
fn final_delta_carries_timings_and_slot_id() {
    let mut parser = FrameParser::new();
    let deltas = parser
        .push_chunk(
            b"data: {\"content\":\"\",\"stop\":true,\"slot_id\":2,\
              \"timings\":{\"prompt_per_second\":512.5,\"predicted_per_second\":42.0}}\n",
        )
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].slot_id, Some(2));
    let timings = deltas[0].timings.as_ref().unwrap();
    assert_eq!(timings.prompt_per_second, Some(512.5));
    assert_eq!(timings.predicted_per_second, Some(42.0));
}
