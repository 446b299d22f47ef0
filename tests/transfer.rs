//! Integration tests for the go-back-N data-transfer service.
//!
//! The secondary link runs as its own tokio task; the test body scripts the
//! primary station frame by frame, so every acknowledgment pattern (cumulative,
//! duplicate, lossy) is exercised deterministically.

use hdlc_secondary::channel::FrameChannel;
use hdlc_secondary::frame::{Frame, UnnumberedKind};
use hdlc_secondary::link::SecondaryLink;
use hdlc_secondary::simulator::{linked_pair, LinkedChannel};

const STATION: u8 = 3;

fn snrm() -> String {
    Frame::Unnumbered {
        address: STATION,
        modifier: UnnumberedKind::SetNormalResponseMode,
        poll_final: true,
    }
    .encode()
}

fn rr(nr: u8, poll: bool) -> String {
    Frame::Supervisory {
        address: STATION,
        poll_final: poll,
        nr,
    }
    .encode()
}

/// Drive the primary's half of the handshake: send SNRM, consume the UA.
async fn handshake(primary: &mut LinkedChannel) {
    primary.transmit(&snrm()).await.unwrap();
    let ua = primary.receive().await.unwrap().expect("UA frame");
    assert!(matches!(
        Frame::decode(&ua).unwrap(),
        Frame::Unnumbered {
            modifier: UnnumberedKind::UnnumberedAck,
            ..
        }
    ));
}

/// Receive and unpack the next I-frame: `(ns, final bit, payload)`.
async fn recv_iframe(primary: &mut LinkedChannel) -> (u8, bool, Vec<u8>) {
    let wire = primary.receive().await.unwrap().expect("I frame");
    match Frame::decode(&wire).unwrap() {
        Frame::Information {
            address,
            ns,
            poll_final,
            nr,
            payload,
        } => {
            assert_eq!(address, STATION);
            // The secondary receives no numbered frames, so the piggy-backed
            // N(R) stays at its reset value.
            assert_eq!(nr, 0);
            (ns, poll_final, payload)
        }
        other => panic!("expected I-frame, got {other}"),
    }
}

/// Spawn the secondary: handshake, then deliver `payload`.
fn spawn_secondary(
    chan: LinkedChannel,
    window: usize,
    payload: Vec<u8>,
) -> tokio::task::JoinHandle<SecondaryLink<LinkedChannel>> {
    tokio::spawn(async move {
        let mut link = SecondaryLink::with_window_size(chan, STATION, window);
        link.connect_indication().await.expect("indication");
        link.connect_response().await.expect("response");
        let outcome = link.data_request(&payload).await.expect("data request");
        assert!(outcome.is_successful());
        assert_eq!(outcome.address, 0);
        link
    })
}

// ---------------------------------------------------------------------------
// Test 1: 200-byte SDU, window 4, one cumulative acknowledgment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn window_of_four_delivers_four_fragments() {
    let payload: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let (mut primary, secondary_chan) = linked_pair();
    let secondary = spawn_secondary(secondary_chan, 4, payload);

    handshake(&mut primary).await;
    primary.transmit(&rr(0, true)).await.unwrap();

    // 200 bytes fragment as 64 + 64 + 64 + 8; window 4 lets all fly at once.
    let mut got = Vec::new();
    let mut finals = Vec::new();
    for seq in 0..4u8 {
        let (ns, fin, data) = recv_iframe(&mut primary).await;
        assert_eq!(ns, seq);
        finals.push(fin);
        got.extend(data);
    }
    assert_eq!(finals, vec![false, false, false, true]);
    assert_eq!(got, expected);

    // One cumulative N(R) retires the whole window.
    primary.transmit(&rr(4, false)).await.unwrap();

    let link = secondary.await.unwrap();
    assert!(link.window.is_empty());
    assert_eq!(link.window.left_edge(), 4);
}

// ---------------------------------------------------------------------------
// Test 2: duplicate acknowledgment forces a go-back-N replay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_ack_triggers_go_back_n() {
    let payload: Vec<u8> = (0..200u32).map(|i| (i % 17) as u8).collect();

    let (mut primary, secondary_chan) = linked_pair();
    let secondary = spawn_secondary(secondary_chan, 4, payload);

    handshake(&mut primary).await;
    primary.transmit(&rr(0, true)).await.unwrap();

    let mut first_round = Vec::new();
    for seq in 0..4u8 {
        let (ns, _fin, data) = recv_iframe(&mut primary).await;
        assert_eq!(ns, seq);
        first_round.push(data);
    }

    // Acknowledge frames 0 and 1, then repeat the same N(R): the repeat
    // signals loss and must replay exactly the frames numbered 2 and up.
    primary.transmit(&rr(2, false)).await.unwrap();
    primary.transmit(&rr(2, false)).await.unwrap();

    let (ns, fin, data) = recv_iframe(&mut primary).await;
    assert_eq!((ns, fin), (2, false));
    assert_eq!(data, first_round[2]);

    let (ns, fin, data) = recv_iframe(&mut primary).await;
    assert_eq!((ns, fin), (3, true));
    assert_eq!(data, first_round[3]);

    primary.transmit(&rr(4, false)).await.unwrap();

    let link = secondary.await.unwrap();
    assert!(link.window.is_empty());
}

// ---------------------------------------------------------------------------
// Test 3: a dropped frame is recovered through go-back-N
// ---------------------------------------------------------------------------

#[tokio::test]
async fn go_back_n_recovers_from_a_lost_frame() {
    let payload: Vec<u8> = (0..200u32).map(|i| (i % 97) as u8).collect();
    let expected = payload.clone();

    let (mut primary, mut secondary_chan) = linked_pair();
    // The secondary's transmit sequence is UA(#0), then I-frames #1..#4.
    // Losing #3 swallows the frame numbered 2.
    secondary_chan.faults.drop_sends = vec![3];

    let secondary = spawn_secondary(secondary_chan, 4, payload);

    handshake(&mut primary).await;
    primary.transmit(&rr(0, true)).await.unwrap();

    // The gap shows up as sequence numbers 0, 1, 3 arriving.
    let mut seen = Vec::new();
    let mut in_order = Vec::new();
    for _ in 0..3 {
        let (ns, _fin, data) = recv_iframe(&mut primary).await;
        if ns == seen.len() as u8 {
            in_order.push(data.clone());
        }
        seen.push(ns);
    }
    assert_eq!(seen, vec![0, 1, 3]);

    // Acknowledge the in-order prefix, then repeat the N(R) to request the
    // missing frame and everything after it.
    primary.transmit(&rr(2, false)).await.unwrap();
    primary.transmit(&rr(2, false)).await.unwrap();

    let (ns, fin, data) = recv_iframe(&mut primary).await;
    assert_eq!((ns, fin), (2, false));
    in_order.push(data);
    let (ns, fin, data) = recv_iframe(&mut primary).await;
    assert_eq!((ns, fin), (3, true));
    in_order.push(data);

    primary.transmit(&rr(4, false)).await.unwrap();

    let link = secondary.await.unwrap();
    assert!(link.window.is_empty());

    let delivered: Vec<u8> = in_order.into_iter().flatten().collect();
    assert_eq!(delivered, expected);
}

// ---------------------------------------------------------------------------
// Test 4: long SDU wraps the sequence space under a small window
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequence_numbers_wrap_across_long_transfer() {
    // 522 bytes fragment as eight full frames plus a 10-byte tail: nine
    // fragments, so the ninth reuses sequence number 0.
    let payload: Vec<u8> = (0..522u32).map(|i| (i % 113) as u8).collect();
    let expected = payload.clone();
    let total_fragments = 9;

    let (mut primary, secondary_chan) = linked_pair();
    let secondary = spawn_secondary(secondary_chan, 4, payload);

    handshake(&mut primary).await;
    primary.transmit(&rr(0, true)).await.unwrap();

    let mut got = Vec::new();
    for i in 0..total_fragments {
        let (ns, fin, data) = recv_iframe(&mut primary).await;
        assert_eq!(ns, (i % 8) as u8);
        assert_eq!(fin, i == total_fragments - 1);
        got.extend(data);
        primary.transmit(&rr(((i + 1) % 8) as u8, false)).await.unwrap();
    }
    assert_eq!(got, expected);

    let link = secondary.await.unwrap();
    assert!(link.window.is_empty());
    assert_eq!(link.window.left_edge(), 1);
}

// ---------------------------------------------------------------------------
// Test 5: empty SDU completes after the poll without sending I-frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_sdu_completes_after_poll() {
    let (mut primary, secondary_chan) = linked_pair();
    let secondary = spawn_secondary(secondary_chan, 4, Vec::new());

    handshake(&mut primary).await;
    primary.transmit(&rr(0, true)).await.unwrap();

    let link = secondary.await.unwrap();
    assert!(link.window.is_empty());
    assert_eq!(link.window.vs(), 0);
    assert_eq!(primary.poll_receive().unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test 6: non-poll traffic before the invitation is discarded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn waits_for_the_poll_bit_before_transmitting() {
    let payload = b"short message".to_vec();
    let expected = payload.clone();

    let (mut primary, secondary_chan) = linked_pair();
    let secondary = spawn_secondary(secondary_chan, 4, payload);

    handshake(&mut primary).await;

    // An RR without the poll bit and a stray U-frame are not invitations.
    primary.transmit(&rr(0, false)).await.unwrap();
    primary.transmit(&snrm()).await.unwrap();
    primary.transmit(&rr(0, true)).await.unwrap();

    let (ns, fin, data) = recv_iframe(&mut primary).await;
    assert_eq!((ns, fin), (0, true));
    assert_eq!(data, expected);

    primary.transmit(&rr(1, false)).await.unwrap();
    secondary.await.unwrap();
}
