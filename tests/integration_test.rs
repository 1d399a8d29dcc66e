/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use casl2::assemble;
use casl2::object::{self, ObjectFile};
use casl2::vm::Machine;
use casl2::vm::console::MockConsole;

fn assemble_ok(source: &str) -> ObjectFile {
    assemble("test.cas", source).unwrap().object
}

fn assemble_err(source: &str) -> String {
    assemble("test.cas", source).unwrap_err().to_string()
}

#[test]
fn minimal_program_and_header_bytes() {
    let obj = assemble_ok("MAIN  START\n      RET\n      END\n");
    assert_eq!(obj.entry, 0);
    assert_eq!(obj.words, vec![0x8100]);

    let mut bytes = Vec::new();
    object::write(&mut bytes, &obj).unwrap();
    assert_eq!(&bytes[0..6], &[0x43, 0x41, 0x53, 0x4C, 0x00, 0x00]);
    assert_eq!(&bytes[6..16], &[0u8; 10]);
    assert_eq!(&bytes[16..18], &[0x81, 0x00]);
    assert_eq!(bytes.len(), 18);
}

#[test]
fn start_operand_sets_the_entry_point() {
    let obj = assemble_ok("MAIN  START LOOP\n      NOP\nLOOP  RET\n      END\n");
    assert_eq!(obj.entry, 1);
    assert_eq!(obj.words, vec![0x0000, 0x8100]);
}

#[test]
fn literal_lands_past_the_last_instruction() {
    let obj = assemble_ok("MAIN  START\n      LD GR1,=5\n      RET\n      END\n");
    assert_eq!(obj.words, vec![0x1010, 0x0003, 0x8100, 0x0005]);
}

#[test]
fn textually_identical_literals_share_one_pool_entry() {
    let source = "MAIN  START\n      LD GR1,='A'\n      LD GR2,='A'\n      RET\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words.len(), 6);
    assert_eq!(obj.words[1], 5);
    assert_eq!(obj.words[3], 5);
    assert_eq!(obj.words[5], 0x41);
}

#[test]
fn string_literals_pool_one_word_per_byte() {
    let source = "MAIN  START\n      LD GR1,='AB'\n      RET\n      END\n";
    let obj = assemble_ok(source);
    // Two pooled words follow the RET.
    assert_eq!(obj.words[1], 3);
    assert_eq!(&obj.words[3..5], &[0x41, 0x42]);
}

#[test]
fn dc_with_escaped_quote() {
    let obj = assemble_ok("MAIN  START\n      DC 'a''c'\n      END\n");
    assert_eq!(obj.words, vec![0x61, 0x27, 0x63]);

    let obj = assemble_ok("MAIN  START\n      DC 'ab''c'\n      END\n");
    assert_eq!(obj.words, vec![0x61, 0x62, 0x27, 0x63]);
}

#[test]
fn dc_numbers_hex_and_labels() {
    let source = "MAIN  START\n      RET\nL     DC 1,-1,#00ff,L\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words, vec![0x8100, 1, 0xFFFF, 0x00FF, 1]);
}

#[test]
fn ds_reserves_zeroed_words() {
    let obj = assemble_ok("MAIN  START\n      RET\nBUF   DS 3\n      END\n");
    assert_eq!(obj.words, vec![0x8100, 0, 0, 0]);
}

#[test]
fn register_register_form_collapses_to_one_word() {
    let obj = assemble_ok("MAIN  START\n      ADDA GR1,GR2\n      RET\n      END\n");
    assert_eq!(obj.words, vec![0x2412, 0x8100]);
}

#[test]
fn index_register_encodes_in_the_low_nibble() {
    let obj = assemble_ok("MAIN  START\n      LD GR1,#0010,GR2\n      RET\n      END\n");
    assert_eq!(obj.words, vec![0x1012, 0x0010, 0x8100]);
}

#[test]
fn in_macro_expands_to_twelve_words() {
    let source =
        "MAIN  START\n      IN BUF,LEN\n      RET\nBUF   DS 8\nLEN   DS 1\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words.len(), 22);
    assert_eq!(
        &obj.words[0..12],
        &[
            0x7001, 0x0000, // PUSH 0, GR1
            0x7002, 0x0000, // PUSH 0, GR2
            0x1210, 13,     // LAD GR1, BUF
            0x1220, 21,     // LAD GR2, LEN
            0xF000, 0xFFF0, // SVC
            0x7120, // POP GR2
            0x7110, // POP GR1
        ]
    );
}

#[test]
fn out_macro_uses_the_output_vector() {
    let source =
        "MAIN  START\n      OUT BUF,LEN\n      RET\nBUF   DS 8\nLEN   DS 1\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words[9], 0xFFF2);
}

#[test]
fn rpush_and_rpop_expansions() {
    let obj = assemble_ok("MAIN  START\n      RPUSH\n      RPOP\n      RET\n      END\n");
    assert_eq!(obj.words.len(), 14 + 7 + 1);
    assert_eq!(&obj.words[0..4], &[0x7001, 0x0000, 0x7002, 0x0000]);
    assert_eq!(obj.words[12], 0x7007);
    // RPOP restores in reverse order.
    assert_eq!(obj.words[14], 0x7170);
    assert_eq!(obj.words[20], 0x7110);
    assert_eq!(obj.words[21], 0x8100);
}

#[test]
fn labels_are_scoped_per_start_block() {
    let source = "A     START\n      LD GR1,L\n      RET\nL     DC 1\n      END\n\
                  B     START\n      LD GR1,L\n      RET\nL     DC 2\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words[1], 3);
    assert_eq!(obj.words[3], 1);
    assert_eq!(obj.words[5], 7);
    assert_eq!(obj.words[7], 2);
}

#[test]
fn call_reaches_a_sibling_routine() {
    let source = "MAIN  START\n      CALL SUB\n      RET\n      END\n\
                  SUB   START\n      RET\n      END\n";
    let obj = assemble_ok(source);
    assert_eq!(obj.words, vec![0x8000, 3, 0x8100, 0x8100]);
}

#[test]
fn later_start_operand_repoints_the_routine_entry() {
    let source = "MAIN  START\n      CALL SUB\n      RET\n      END\n\
                  SUB   START INIT\n      NOP\nINIT  RET\n      END\n";
    let obj = assemble_ok(source);
    // The CALL lands on INIT, one word past SUB's first instruction.
    assert_eq!(obj.words[1], 4);
}

#[test]
fn duplicate_label_is_rejected() {
    let source = "MAIN  START\nL     DC 1\nL     DC 2\n      END\n";
    let err = assemble_err(source);
    assert_eq!(err, "test.cas:3: Label \"L in routine MAIN\" already defined");
}

#[test]
fn same_label_in_two_blocks_is_fine() {
    let source = "A     START\nL     DC 1\n      END\nB     START\nL     DC 2\n      END\n";
    assert!(assemble("test.cas", source).is_ok());
}

#[test]
fn gr0_cannot_index() {
    let err = assemble_err("MAIN  START\n      LD GR1,#0000,GR0\n      END\n");
    assert_eq!(err, "test.cas:2: Can't use GR0 as an index register");
}

#[test]
fn undefined_symbols_are_reported_with_their_routine() {
    let err = assemble_err("MAIN  START\n      LD GR1,NOWHERE\n      RET\n      END\n");
    assert_eq!(
        err,
        "test.cas:2: Undefined symbol \"NOWHERE in routine MAIN\""
    );
}

#[test]
fn code_before_start_is_rejected() {
    let err = assemble_err("      RET\n");
    assert_eq!(err, "test.cas:1: No \"START\" instruction found");
}

#[test]
fn missing_end_is_rejected() {
    let err = assemble_err("MAIN  START\n      RET\n");
    assert_eq!(err, "test.cas:2: No \"END\" instruction found");
}

#[test]
fn start_requires_a_label() {
    let err = assemble_err("      START\n      END\n");
    assert_eq!(err, "test.cas:1: No label found at START");
}

#[test]
fn end_rejects_a_label() {
    let err = assemble_err("MAIN  START\n      RET\nX     END\n");
    assert_eq!(err, "test.cas:3: Can't use label \"X\" at END");
}

#[test]
fn unknown_mnemonics_are_illegal() {
    let err = assemble_err("MAIN  START\n      MOV GR1,GR2\n      END\n");
    assert_eq!(err, "test.cas:2: Illegal instruction");
}

#[test]
fn ds_operand_must_be_decimal() {
    let err = assemble_err("MAIN  START\n      DS FOO\n      END\n");
    assert_eq!(err, "test.cas:2: \"FOO\" must be decimal");
}

#[test]
fn bad_literal_form_is_rejected_at_end() {
    let err = assemble_err("MAIN  START\n      LD GR1,=XYZ\n      RET\n      END\n");
    assert_eq!(err, "test.cas:4: Invalid literal: =XYZ");
}

#[test]
fn invalid_labels_are_lexical_errors() {
    let err = assemble_err("loop  RET\n");
    assert_eq!(err, "test.cas:1: Invalid label \"loop\"");
}

#[test]
fn listing_rows_elide_repeated_addresses() {
    let assembly = assemble("test.cas", "MAIN  START\n      LD GR1,=5\n      RET\n      END\n")
        .unwrap();
    let rows = &assembly.listing.rows;
    assert_eq!(rows.len(), 4);
    assert!(rows[0].text.is_some());
    assert!(rows[1].text.is_none());
    assert!(rows[2].text.is_some());
    let text = assembly.listing.to_string();
    assert!(text.contains("   2 0000 1010\t      LD GR1,=5"));
    assert!(text.contains("   2      0003"));
    assert!(text.contains("Defined symbols:"));
}

#[test]
fn object_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.com");
    let obj = assemble_ok("MAIN  START\n      LD GR1,=5\n      RET\n      END\n");
    object::write_file(&path, &obj).unwrap();
    let loaded = object::read_file(&path).unwrap();
    assert_eq!(loaded, obj);
}

#[test]
fn assembled_program_runs_on_the_machine() {
    let obj = assemble_ok("MAIN  START\n      LD GR1,=5\n      RET\n      END\n");
    let mut machine = Machine::new();
    machine.load(&obj).unwrap();
    let mut console = MockConsole::default();
    machine.run(&mut console).unwrap();
    assert_eq!(machine.gr[1], 5);
    assert_eq!(machine.fr.bits(), 0b000);
}

#[test]
fn overflow_program_sets_of_and_sf() {
    let source = "MAIN  START\n      LD GR1,BIG\n      ADDA GR1,ONE\n      RET\n\
                  BIG   DC #7fff\nONE   DC 1\n      END\n";
    let obj = assemble_ok(source);
    let mut machine = Machine::new();
    machine.load(&obj).unwrap();
    let mut console = MockConsole::default();
    machine.run(&mut console).unwrap();
    assert_eq!(machine.gr[1], 0x8000);
    assert_eq!(machine.fr.bits(), 0b110);
}

#[test]
fn in_out_program_echoes_its_input() {
    let source = "MAIN  START\n      IN BUF,LEN\n      OUT BUF,LEN\n      RET\n\
                  BUF   DS 256\nLEN   DS 1\n      END\n";
    let obj = assemble_ok(source);
    let mut machine = Machine::new();
    machine.load(&obj).unwrap();
    let mut console = MockConsole::with_input(&["hello, comet"]);
    machine.run(&mut console).unwrap();
    assert_eq!(machine.gr[1], 0);
    assert_eq!(console.outputs, vec!["hello, comet"]);
}
