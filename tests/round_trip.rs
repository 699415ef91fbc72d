//! Integration tests for the disassemble/assemble round trip.
//!
//! Every script here is decoded to text, the text is assembled again and
//! the result must be the input bytes exactly.

use std::collections::HashSet;

use scummasm::config::DisassemblyConfig;
use scummasm::disassembler::END_MARKER;
use scummasm::instruction::Instruction;
use scummasm::opcode_tables::{Form, OPCODE_SPECS};
use scummasm::verify::round_trip;
use scummasm::{Assembler, Disassembler, OpcodeTable};
use test_log::test;

fn listing(bytes: &[u8], recursive: bool) -> String {
    Disassembler::new(OpcodeTable::standard(), DisassemblyConfig::default())
        .disassemble(bytes, recursive)
        .unwrap()
}

fn assert_round_trip(bytes: &[u8], recursive: bool) {
    let report = round_trip(
        OpcodeTable::standard(),
        &DisassemblyConfig::default(),
        bytes,
        recursive,
    )
    .unwrap();
    assert_eq!(
        report.reassembled, report.original,
        "listing did not reassemble:\n{}",
        report.text
    );
}

/// The smallest useful script: one call and nothing else.
#[test]
fn test_put_actor_script() {
    let bytes = [0x01, 0x05, 0x0a, 0x00, 0x14, 0x00];
    assert_eq!(
        listing(&bytes, false),
        format!("    putActor(5, 10, 20)\n{}\n", END_MARKER)
    );
    assert_round_trip(&bytes, false);
}

/// A script holding only `stopObjectCode` keeps it as its terminal line.
#[test]
fn test_lone_stop_object_code() {
    let text = listing(&[0x00], false);
    assert_eq!(text, format!("    stopObjectCode()\n{}\n", END_MARKER));
    assert_eq!(Assembler::default().assemble(&text).unwrap(), vec![0x00]);
}

#[test]
fn test_loops_and_conditions() {
    let bytes = [
        0x20, // L2: stopMusic()
        0x48, 0x64, 0x00, 0x03, 0x00, 0x08, 0x00, // unless (Var[100] == 3) goto L1
        0x5a, 0x64, 0x00, 0x01, 0x00, // Var[100] += 1
        0x18, 0xf0, 0xff, // goto L2
        0x00, // L1: stopObjectCode()
    ];
    // labels are numbered by first reference
    let text = listing(&bytes, false);
    assert!(text.starts_with("L2:\n"), "{}", text);
    assert!(text.contains("unless (Var[100] == 3) goto L1"), "{}", text);
    assert!(text.contains("L1:\n    stopObjectCode()"), "{}", text);
    assert_round_trip(&bytes, false);
}

#[test]
fn test_expressions() {
    // Var[100] = ((Var[10] + 7) * getActorRoom(5))
    let bytes = [
        0xac, 0x64, 0x00, //
        0x81, 0x0a, 0x00, 0x01, 0x07, 0x00, 0x02, //
        0x06, 0x03, 0x00, 0x00, 0x05, //
        0x04, 0xff, //
        0x00,
    ];
    assert_round_trip(&bytes, false);
}

#[test]
fn test_variables() {
    let bytes = [
        0x9a, 0x65, 0x00, 0x64, 0x20, 0x02, 0x60, // compound with variable offset
        0x1a, 0x01, 0x00, 0x05, 0x00, // VAR_EGO = 5
        0x46, 0x03, 0x80, // Bit[3]++
        0x1a, 0x01, 0x40, 0xff, 0xff, // Local[1] = -1
        0x00,
    ];
    assert_round_trip(&bytes, false);
}

#[test]
fn test_sub_opcode_blocks() {
    let bytes = [
        0x13, 0x01, 0x01, 0x05, 0x02, 0x02, 0x03, 0xff, // actorOps
        0x14, 0x01, 0x01, 0x04, 0x0f, b'H', b'i', 0xff, 0x01, 0x00, // print
        0x14, 0x02, 0x01, 0x04, 0xff, // print without text
        0x05, 0x64, 0x00, 0x1f, // drawObject without setter
        0x00,
    ];
    assert_round_trip(&bytes, false);
}

#[test]
fn test_special_forms() {
    let bytes = [
        0x2a, 0x0c, 0x01, 0x01, 0x00, 0x81, 0x64, 0x00, 0xff, // startScript
        0x26, 0x64, 0x00, 0x02, 0x05, 0x07, // setVarRange
        0xcc, 0x05, 0x81, 0x82, 0x00, // pseudoRoom
        0x58, 0x01, // beginOverride
        0x19, 0xfe, // stopSentence
        0x58, 0x00, // endOverride
        0x2e, 0x3c, 0x00, 0x00, // delay
        0x80, // breakHere
        0x00,
    ];
    assert_round_trip(&bytes, false);
}

/// Recursive scripts have no terminal line and no end marker.
#[test]
fn test_recursive_script() {
    let bytes = [0x20, 0x80, 0x18, 0xfb, 0xff];
    let text = listing(&bytes, true);
    assert!(!text.contains(END_MARKER));
    assert_round_trip(&bytes, true);
}

#[test]
fn test_annotated_listing_round_trips() {
    let config = DisassemblyConfig {
        annotate: true,
        label_prefix: "loc".to_string(),
        named_system_vars: false,
    };
    let bytes = [0x20, 0x1a, 0x01, 0x00, 0x05, 0x00, 0x18, 0xf7, 0xff, 0x00];
    let report = round_trip(OpcodeTable::standard(), &config, &bytes, false).unwrap();
    assert!(report.text.contains("loc1:"));
    assert!(report.text.contains("Var[1] = 5"));
    assert!(report.is_identical(), "{}", report.text);
}

// One vector per instruction family and addressing-mode variant. Every
// script gets a closing stopObjectCode, which is also where the jumps with a
// zero offset land.

const CALLS: &[&[u8]] = &[
    &[0x01, 0x05, 0x0a, 0x00, 0x14, 0x00],
    &[0x81, 0x64, 0x00, 0x0a, 0x00, 0x14, 0x00],
    &[0x41, 0x05, 0x64, 0x00, 0x14, 0x00],
    &[0x21, 0x05, 0x0a, 0x00, 0x01, 0x40],
    &[0xe1, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x02, 0x07],
    &[0x82, 0x64, 0x00],
    &[0x07, 0x10, 0x00, 0x01],
    &[0xc7, 0x64, 0x00, 0x01, 0x40],
    &[0x09, 0x01, 0x02, 0x00],
    &[0x49, 0x01, 0x64, 0x00],
    &[0x0d, 0x01, 0x02, 0x05],
    &[0xcd, 0x64, 0x00, 0x65, 0x00, 0x05],
    &[0x0e, 0x01, 0x10, 0x00],
    &[0x8e, 0x64, 0x00, 0x10, 0x00],
    &[0x11, 0x01, 0xfa],
    &[0x12, 0xa0, 0x00],
    &[0x92, 0x64, 0x00],
    &[0x1c, 0x03],
    &[0x1e, 0x01, 0x10, 0x00, 0x20, 0x00],
    &[0xbe, 0x64, 0x00, 0x10, 0x00, 0x65, 0x00],
    &[0x20],
    &[0x24, 0x10, 0x00, 0x05, 0x40, 0x00, 0x80, 0x00],
    &[0xa4, 0x64, 0x00, 0x05, 0xff, 0xff, 0x80, 0x00],
    &[0x25, 0x10, 0x00, 0x05],
    &[0x69, 0x10, 0x00, 0x64, 0x00],
    &[0x2b, 0x64, 0x00],
    &[0x2d, 0x01, 0x05],
    &[0x2e, 0x3c, 0x00, 0x00],
    &[0x32, 0xa0, 0x00],
    &[0x36, 0x01, 0x10, 0x00],
    &[0x37, 0x10, 0x00, 0x01, 0x01, 0x05, 0x00, 0x81, 0x64, 0x00, 0xff],
    &[0x77, 0x10, 0x00, 0x64, 0x00, 0xff],
    &[0x3c, 0x03],
    &[0x3f, 0x01, 0x00, 0x02, 0x00, 0x40, 0x03, 0x00, 0x04, 0x00, 0x05],
    &[0xbf, 0x64, 0x00, 0x02, 0x00, 0xe0, 0x65, 0x00, 0x66, 0x00, 0x67, 0x00],
    &[0x40, 0x01, 0x01, 0x00, 0xff],
    &[0x40, 0xff],
    &[0x42, 0x0c, 0x01, 0x02, 0x00, 0xff],
    &[0xc2, 0x64, 0x00, 0xff],
    &[0x4c, 0x01, 0x03, 0x00, 0x81, 0x64, 0x00, 0xff],
    &[0x50, 0x10, 0x00],
    &[0x52, 0x01],
    &[0x54, 0x10, 0x00, b'K', b'e', b'y', 0x00],
    &[0xd4, 0x64, 0x00, 0x00],
    &[0x5d, 0x10, 0x00, 0x01, 0x85, 0x00, 0xff],
    &[0x60, 0x01],
    &[0x62, 0x05],
    &[0x6b, 0x01, 0x00],
    &[0x6e, 0x10, 0x00],
    &[0x70, 0x0b, 0x00, 0x00],
    &[0xf0, 0x64, 0x00, 0x01, 0x02],
    &[0x72, 0x05],
    &[0xf2, 0x64, 0x00],
    &[0x80],
    &[0xa0],
    &[0xc0],
];

const STORES: &[&[u8]] = &[
    &[0x03, 0x64, 0x00, 0x01],
    &[0x83, 0x64, 0x00, 0x01, 0x40],
    &[0x06, 0x64, 0x00, 0x01],
    &[0x0b, 0x64, 0x00, 0x10, 0x00, 0x02, 0x00],
    &[0xcb, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x0f, 0x64, 0x00, 0x10, 0x00],
    &[0x8f, 0x64, 0x00, 0x65, 0x00],
    &[0x10, 0x64, 0x00, 0x10, 0x00],
    &[0x15, 0x64, 0x00, 0x10, 0x00, 0x20, 0x00],
    &[0x16, 0x64, 0x00, 0x09],
    &[0x22, 0x64, 0x00, 0x01],
    &[0x23, 0x64, 0x00, 0x01, 0x00],
    &[0x31, 0x64, 0x00, 0x01],
    &[0x34, 0x64, 0x00, 0x10, 0x00, 0x11, 0x00],
    &[0x35, 0x64, 0x00, 0x10, 0x20],
    &[0xf5, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x3b, 0x64, 0x00, 0x01],
    &[0x3d, 0x64, 0x00, 0x01, 0x02],
    &[0x43, 0x64, 0x00, 0x01, 0x00],
    &[0xc3, 0x64, 0x00, 0x65, 0x00],
    &[0x56, 0x64, 0x00, 0x01],
    &[0x63, 0x64, 0x00, 0x01],
    &[0x66, 0x64, 0x00, 0x10, 0x00],
    &[0x67, 0x64, 0x00, 0x02],
    &[0x68, 0x64, 0x00, 0x05],
    &[0x6c, 0x64, 0x00, 0x01],
    &[0x71, 0x64, 0x00, 0x01],
    &[0x7b, 0x64, 0x00, 0x01],
    &[0x7c, 0x64, 0x00, 0x03],
];

const UPDATES: &[&[u8]] = &[
    &[0x1a, 0x64, 0x00, 0x05, 0x00],
    &[0x1a, 0x64, 0x00, 0xfb, 0xff],
    &[0x9a, 0x64, 0x00, 0x01, 0x40],
    &[0x17, 0x64, 0x00, 0x0f, 0x00],
    &[0x97, 0x64, 0x00, 0x65, 0x00],
    &[0x57, 0x64, 0x00, 0x10, 0x00],
    &[0xd7, 0x64, 0x00, 0x65, 0x00],
    &[0x5a, 0x64, 0x00, 0x01, 0x00],
    &[0xda, 0x64, 0x00, 0x03, 0x80],
    &[0x3a, 0x64, 0x00, 0x01, 0x00],
    &[0xba, 0x64, 0x00, 0x65, 0x00],
    &[0x1b, 0x64, 0x00, 0x02, 0x00],
    &[0x9b, 0x64, 0x00, 0x65, 0x00],
    &[0x5b, 0x64, 0x00, 0x02, 0x00],
    &[0xdb, 0x64, 0x00, 0x65, 0x00],
    &[0x46, 0x64, 0x00],
    &[0xc6, 0x01, 0x40],
];

const CONDITIONS: &[&[u8]] = &[
    &[0x48, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0xc8, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x08, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0x88, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x78, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0x04, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0x44, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0xc4, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x38, 0x64, 0x00, 0x03, 0x00, 0x00, 0x00],
    &[0x28, 0x64, 0x00, 0x00, 0x00],
    &[0xa8, 0x64, 0x00, 0x00, 0x00],
    &[0x1f, 0x01, 0x02, 0x00, 0x00],
    &[0xdf, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x1d, 0x10, 0x00, 0x01, 0x06, 0x00, 0x01, 0x87, 0x00, 0xff, 0x00, 0x00],
    &[0x9d, 0x64, 0x00, 0x81, 0x65, 0x00, 0xff, 0x00, 0x00],
    &[0x2f, 0x10, 0x00, 0x01, 0x00, 0x00],
    &[0xef, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x4f, 0x10, 0x00, 0x64, 0x00, 0x00, 0x00],
    &[0xcf, 0x64, 0x00, 0x65, 0x00, 0x00, 0x00],
    &[0x18, 0x00, 0x00],
];

const BLOCKS: &[&[u8]] = &[
    // actorOps(1) with every setter
    &[
        0x13, 0x01, //
        0x00, 0x05, 0x01, 0x05, 0x02, 0x02, 0x03, 0x03, 0x04, 0x04, 0x05, //
        0x05, 0x06, 0x07, 0x06, 0x08, 0x07, 0x01, 0x02, 0x03, 0x08, //
        0x09, 0x10, 0x00, 0x0a, 0x0b, 0x01, 0x02, 0x0c, 0x0f, //
        0x0d, b'B', b'o', b'b', 0x00, 0x0e, 0x01, 0x10, 0x18, 0x11, 0xff, 0xff, //
        0x12, 0x13, 0x01, 0x14, 0x15, 0x16, 0x02, 0x17, 0x00, 0xff,
    ],
    &[0x13, 0x01, 0x81, 0x64, 0x00, 0xc2, 0x64, 0x00, 0x01, 0x40, 0x42, 0x02, 0x64, 0x00, 0xff],
    &[0x53, 0x01, 0x01, 0x05, 0xff],
    &[0xd3, 0x64, 0x00, 0x81, 0x65, 0x00, 0xff],
    // verbOps(1) with every setter
    &[
        0x7a, 0x01, //
        0x01, 0x10, 0x00, 0x02, b'L', b'o', b'o', b'k', 0x00, 0x03, 0x05, 0x04, 0x0f, //
        0x05, 0x10, 0x00, 0x90, 0x00, 0x06, 0x07, 0x08, 0x09, 0x10, 0x08, 0x11, //
        0x12, 0x6c, 0x13, 0x14, 0x05, 0x00, 0x16, 0x10, 0x00, 0x01, 0x17, 0x00, 0xff,
    ],
    &[0xfa, 0x64, 0x00, 0x81, 0x65, 0x00, 0xff],
    // print(1) with every setter, closed by its text
    &[
        0x14, 0x01, //
        0x00, 0x10, 0x00, 0x20, 0x00, 0x01, 0x04, 0x02, 0x40, 0x01, //
        0x03, 0x01, 0x00, 0x02, 0x00, 0x04, 0x06, 0x07, 0x08, 0x01, 0x00, 0x02, 0x00, //
        0x0f, b'H', b'i', 0xff, 0x01, b'!', 0x00,
    ],
    &[0x94, 0x64, 0x00, 0x0f, 0x00],
    &[0x14, 0x02, 0x81, 0x64, 0x00, 0xff],
    &[
        0xd8, //
        0x00, 0x10, 0x00, 0x20, 0x00, 0x01, 0x04, 0x02, 0x40, 0x01, //
        0x03, 0x01, 0x00, 0x02, 0x00, 0x04, 0x06, 0x07, 0x08, 0x01, 0x00, 0x02, 0x00, //
        0x0f, b'A', 0xff, 0x04, 0x64, 0x00, b'B', 0x00,
    ],
    &[0xd8, 0x01, 0x03, 0xff],
    &[0x05, 0x10, 0x00, 0x01, 0x10, 0x00, 0x20, 0x00],
    &[0x05, 0x10, 0x00, 0xc1, 0x64, 0x00, 0x65, 0x00],
    &[0x85, 0x64, 0x00, 0x82, 0x65, 0x00],
    &[0x05, 0x10, 0x00, 0x1f],
    &[0x45, 0x10, 0x00, 0x1f],
    &[0xc5, 0x64, 0x00, 0x02, 0x01, 0x00],
];

const SELECTS: &[&[u8]] = &[
    &[0x0c, 0x01, 0x05],
    &[0x0c, 0x02, 0x05],
    &[0x0c, 0x03, 0x05],
    &[0x0c, 0x04, 0x05],
    &[0x0c, 0x05, 0x05],
    &[0x0c, 0x06, 0x05],
    &[0x0c, 0x07, 0x05],
    &[0x0c, 0x08, 0x05],
    &[0x0c, 0x09, 0x05],
    &[0x0c, 0x0a, 0x05],
    &[0x0c, 0x0b, 0x05],
    &[0x0c, 0x0c, 0x05],
    &[0x0c, 0x0d, 0x05],
    &[0x0c, 0x0e, 0x05],
    &[0x0c, 0x0f, 0x05],
    &[0x0c, 0x10, 0x05],
    &[0x0c, 0x11],
    &[0x0c, 0x12, 0x05],
    &[0x0c, 0x13, 0x05],
    &[0x0c, 0x14, 0x05, 0x10, 0x00],
    &[0x0c, 0x81, 0x64, 0x00],
    &[0x8c, 0x01, 0x05],
    // roomOps
    &[0x33, 0x01, 0x00, 0x00, 0x40, 0x01],
    &[0x33, 0xc1, 0x64, 0x00, 0x65, 0x00],
    &[0x33, 0x02, 0x01, 0x00, 0x02, 0x00],
    &[0x33, 0x03, 0x00, 0x00, 0x90, 0x00],
    &[0x33, 0x04, 0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x00, 0x05],
    &[0x33, 0xa4, 0x64, 0x00, 0x20, 0x00, 0x65, 0x00, 0x80, 0x66, 0x00],
    &[0x33, 0x05],
    &[0x33, 0x06],
    &[0x33, 0x07, 0x01, 0x02, 0x00, 0x03, 0x04, 0x00, 0x05],
    &[0x33, 0x47, 0x01, 0x64, 0x00, 0x80, 0x65, 0x00, 0x04, 0x40, 0x66, 0x00],
    &[0x33, 0x08, 0x80, 0x00, 0x10],
    &[0x33, 0xe8, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x33, 0x09, 0x01, 0x02],
    &[0x33, 0x0a, 0x86, 0x00],
    &[0x33, 0x0b, 0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x00, 0x01, 0x02],
    &[0x33, 0x0c, 0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x40, 0x01, 0x64, 0x00],
    &[0x33, 0x0d, 0x01, b's', b'a', b'v', b'e', 0x00],
    &[0x33, 0x0e, 0x01, b'x', 0x00],
    &[0x33, 0x0f, 0x01, 0x00, 0x10, 0x20, 0x00, 0x05],
    &[0x33, 0x8f, 0x64, 0x00, 0xc0, 0x65, 0x00, 0x66, 0x00, 0x80, 0x67, 0x00],
    &[0x33, 0x10, 0x01, 0x05],
    &[0x73, 0x05],
    &[0xb3, 0x01, 0x00, 0x00, 0x40, 0x01],
    &[0xf3, 0xc1, 0x64, 0x00, 0x65, 0x00],
    // cursorCommand
    &[0x2c, 0x01],
    &[0x2c, 0x02],
    &[0x2c, 0x03],
    &[0x2c, 0x04],
    &[0x2c, 0x05],
    &[0x2c, 0x06],
    &[0x2c, 0x07],
    &[0x2c, 0x08],
    &[0x2c, 0x0a, 0x01, 0x02],
    &[0x2c, 0x0b, 0x01, 0x02, 0x03],
    &[0x2c, 0x0c, 0x01],
    &[0x2c, 0x0d, 0x02],
    &[0x2c, 0x8d, 0x64, 0x00],
    &[0x2c, 0x0e, 0x01, 0x00, 0x00, 0x01, 0x0f, 0x00, 0x81, 0x64, 0x00, 0xff],
    // stringOps
    &[0x27, 0x01, 0x05, b'a', b'b', 0x00],
    &[0x27, 0x02, 0x01, 0x02],
    &[0x27, 0x03, 0x01, 0x02, 0x41],
    &[0x27, 0xe3, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x27, 0x04, 0x64, 0x00, 0x01, 0x02],
    &[0x27, 0xc4, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x27, 0x05, 0x01, 0x20],
    // matrixOps
    &[0x30, 0x01, 0x05, 0x80],
    &[0x30, 0xc1, 0x64, 0x00, 0x65, 0x00],
    &[0x30, 0x02, 0x05, 0x01],
    &[0x30, 0x03, 0x05, 0x02],
    &[0x30, 0x04],
    &[0xb0, 0x01, 0x05, 0x80],
    // systemOps
    &[0x98, 0x01],
    &[0x98, 0x02],
    &[0x98, 0x03],
    // wait
    &[0xae, 0x01, 0x01],
    &[0xae, 0x81, 0x64, 0x00],
    &[0xae, 0x02],
    &[0xae, 0x03],
    &[0xae, 0x04],
    // saveRestoreVerbs
    &[0xab, 0x01, 0x01, 0x05, 0x00],
    &[0xab, 0x02, 0x01, 0x05, 0x00],
    &[0xab, 0x03, 0x01, 0x05, 0x01],
    &[0xab, 0xe3, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    // oldRoomEffect
    &[0x5c, 0x03, 0x10, 0x00],
    &[0x5c, 0x83, 0x64, 0x00],
    &[0xdc, 0x03, 0x10, 0x00],
];

const SPECIALS: &[&[u8]] = &[
    &[0xac, 0x64, 0x00, 0x01, 0x05, 0x00, 0xff],
    &[
        0xac, 0x64, 0x00, 0x01, 0x0a, 0x00, 0x81, 0x65, 0x00, 0x03, 0x01, 0x02, 0x00, 0x05, 0xff,
    ],
    &[
        0xac, 0x64, 0x00, 0x06, 0x27, 0x04, 0x00, 0x00, 0x01, 0x02, 0x01, 0x01, 0x00, 0x02, 0xff,
    ],
    &[0x0a, 0x0c, 0xff],
    &[0x8a, 0x64, 0x00, 0xff],
    &[0x6a, 0x0c, 0x01, 0x01, 0x00, 0xff],
    &[0x4a, 0x0c, 0xff],
    &[0x19, 0x05, 0x10, 0x00, 0x11, 0x00],
    &[0x39, 0x05, 0x10, 0x00, 0x64, 0x00],
    &[0xf9, 0x64, 0x00, 0x65, 0x00, 0x66, 0x00],
    &[0x19, 0xfe],
    &[0x39, 0xfe],
    &[0x59, 0xfe],
    &[0x26, 0x64, 0x00, 0x03, 0x01, 0x02, 0x03],
    &[0xa6, 0x64, 0x00, 0x02, 0xff, 0xff, 0x00, 0x10],
    &[0xcc, 0x05, 0x81, 0x82, 0x00],
    &[0xcc, 0x05, 0x00],
    &[0x58, 0x01],
    &[0x58, 0x00],
];

fn family_vectors() -> impl Iterator<Item = &'static [u8]> {
    [CALLS, STORES, UPDATES, CONDITIONS, BLOCKS, SELECTS, SPECIALS]
        .into_iter()
        .flat_map(|group| group.iter().copied())
}

fn closed(bytes: &[u8]) -> Vec<u8> {
    let mut script = bytes.to_vec();
    script.push(0x00);
    script
}

#[test]
fn test_every_family_round_trips() {
    for bytes in family_vectors() {
        let script = closed(bytes);
        let report = round_trip(
            OpcodeTable::standard(),
            &DisassemblyConfig::default(),
            &script,
            false,
        )
        .unwrap_or_else(|e| panic!("{:02x?}: {}", bytes, e));
        assert!(
            report.is_identical(),
            "{:02x?} came back as {:02x?} from:\n{}",
            report.original,
            report.reassembled,
            report.text
        );
    }
}

#[test]
fn test_vectors_cover_every_mnemonic_and_setter() {
    let disasm = Disassembler::new(OpcodeTable::standard(), DisassemblyConfig::default());
    let mut ops = HashSet::new();
    let mut setters = HashSet::new();

    for bytes in family_vectors() {
        let listing = disasm.decompile(&closed(bytes), false).unwrap();
        for statement in listing.statements() {
            let instruction = &statement.instruction;
            ops.insert(instruction.op());
            match instruction {
                Instruction::Block { op, props, .. } => {
                    for prop in props {
                        setters.insert((op.name(), prop.name));
                    }
                }
                Instruction::Select { op, call, .. } => {
                    setters.insert((op.name(), call.name));
                }
                _ => {}
            }
        }
    }

    for spec in OPCODE_SPECS {
        assert!(ops.contains(&spec.op), "no vector for {}", spec.op.name());
        let table = match spec.form {
            Form::Block { table, .. } | Form::Select(table) => table,
            _ => continue,
        };
        for entry in table.entries {
            assert!(
                setters.contains(&(spec.op.name(), entry.name)),
                "no vector for {}.{}",
                table.family,
                entry.name
            );
        }
    }
}

#[test]
fn test_alias_opcodes_keep_their_byte() {
    let text = listing(&closed(&[0x8c, 0x01, 0x05]), false);
    assert!(text.contains("loadScript(5).opcode(0x8c)"), "{}", text);
    let text = listing(&closed(&[0x45, 0x01, 0x00, 0x1f]), false);
    assert!(text.contains("drawObject(1).opcode(0x45)"), "{}", text);
    let text = listing(&closed(&[0x59, 0xfe]), false);
    assert!(text.contains("stopSentence().opcode(0x59)"), "{}", text);
}
