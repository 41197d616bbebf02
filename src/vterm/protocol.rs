// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! ANSI/VT protocol constants used by the parser dispatch.
//!
//! Grouped by sequence family: C0 controls, CSI final bytes, SGR parameter
//! codes, and DEC private mode numbers.

// C0 control bytes handled by `Perform::execute`.
pub const BEL: u8 = 0x07;
pub const BACKSPACE: u8 = 0x08;
pub const TAB: u8 = 0x09;
pub const LINE_FEED: u8 = 0x0a;
pub const VERTICAL_TAB: u8 = 0x0b;
pub const FORM_FEED: u8 = 0x0c;
pub const CARRIAGE_RETURN: u8 = 0x0d;

// CSI final bytes.
pub const CUU_CURSOR_UP: char = 'A';
pub const CUD_CURSOR_DOWN: char = 'B';
pub const CUF_CURSOR_FORWARD: char = 'C';
pub const CUB_CURSOR_BACKWARD: char = 'D';
pub const CNL_CURSOR_NEXT_LINE: char = 'E';
pub const CPL_CURSOR_PREV_LINE: char = 'F';
pub const CHA_CURSOR_COLUMN: char = 'G';
pub const CUP_CURSOR_POSITION: char = 'H';
pub const CHT_FORWARD_TAB: char = 'I';
pub const ED_ERASE_DISPLAY: char = 'J';
pub const EL_ERASE_LINE: char = 'K';
pub const IL_INSERT_LINE: char = 'L';
pub const DL_DELETE_LINE: char = 'M';
pub const DCH_DELETE_CHAR: char = 'P';
pub const SU_SCROLL_UP: char = 'S';
pub const SD_SCROLL_DOWN: char = 'T';
pub const ECH_ERASE_CHAR: char = 'X';
pub const CBT_BACKWARD_TAB: char = 'Z';
pub const ICH_INSERT_CHAR: char = '@';
pub const VPA_VERTICAL_POSITION: char = 'd';
pub const HVP_CURSOR_POSITION: char = 'f';
pub const TBC_TAB_CLEAR: char = 'g';
pub const SM_SET_MODE: char = 'h';
pub const RM_RESET_MODE: char = 'l';
pub const SGR_SET_GRAPHICS: char = 'm';
pub const DSR_DEVICE_STATUS: char = 'n';
pub const DECSTBM_SET_MARGINS: char = 'r';
pub const SCP_SAVE_CURSOR: char = 's';
pub const RCP_RESTORE_CURSOR: char = 'u';

// ESC dispatch bytes.
pub const DECSC_SAVE_CURSOR: u8 = b'7';
pub const DECRC_RESTORE_CURSOR: u8 = b'8';
pub const IND_INDEX_DOWN: u8 = b'D';
pub const NEL_NEXT_LINE: u8 = b'E';
pub const HTS_SET_TAB: u8 = b'H';
pub const RI_REVERSE_INDEX_UP: u8 = b'M';
pub const RIS_RESET_TERMINAL: u8 = b'c';

// Charset selection: `ESC ( B` (ASCII) and `ESC ( 0` (DEC graphics).
pub const G0_CHARSET_INTERMEDIATE: &[u8] = b"(";
pub const CHARSET_ASCII: u8 = b'B';
pub const CHARSET_DEC_GRAPHICS: u8 = b'0';

// SGR parameter codes.
pub const SGR_RESET: u16 = 0;
pub const SGR_BOLD: u16 = 1;
pub const SGR_DIM: u16 = 2;
pub const SGR_ITALIC: u16 = 3;
pub const SGR_UNDERLINE: u16 = 4;
pub const SGR_BLINK: u16 = 5;
pub const SGR_RAPID_BLINK: u16 = 6;
pub const SGR_REVERSE: u16 = 7;
pub const SGR_HIDDEN: u16 = 8;
pub const SGR_STRIKETHROUGH: u16 = 9;
pub const SGR_RESET_BOLD_DIM: u16 = 22;
pub const SGR_RESET_ITALIC: u16 = 23;
pub const SGR_RESET_UNDERLINE: u16 = 24;
pub const SGR_RESET_BLINK: u16 = 25;
pub const SGR_RESET_REVERSE: u16 = 27;
pub const SGR_RESET_HIDDEN: u16 = 28;
pub const SGR_RESET_STRIKETHROUGH: u16 = 29;
pub const SGR_FG_BLACK: u16 = 30;
pub const SGR_FG_WHITE: u16 = 37;
pub const SGR_FG_EXTENDED: u16 = 38;
pub const SGR_FG_DEFAULT: u16 = 39;
pub const SGR_BG_BLACK: u16 = 40;
pub const SGR_BG_WHITE: u16 = 47;
pub const SGR_BG_EXTENDED: u16 = 48;
pub const SGR_BG_DEFAULT: u16 = 49;
pub const SGR_FG_BRIGHT_BLACK: u16 = 90;
pub const SGR_FG_BRIGHT_WHITE: u16 = 97;
pub const SGR_BG_BRIGHT_BLACK: u16 = 100;
pub const SGR_BG_BRIGHT_WHITE: u16 = 107;
pub const SGR_COLOR_MODE_RGB: u16 = 2;
pub const SGR_COLOR_MODE_INDEXED: u16 = 5;

// DEC private mode numbers (`CSI ? Pm h/l`).
pub const DECCKM_APPLICATION_CURSOR_KEYS: u16 = 1;
pub const DECAWM_AUTOWRAP: u16 = 7;
pub const DECTCEM_CURSOR_VISIBLE: u16 = 25;
pub const ALT_SCREEN_47: u16 = 47;
pub const ALT_SCREEN_1047: u16 = 1047;
pub const SAVE_CURSOR_1048: u16 = 1048;
pub const ALT_SCREEN_SAVE_CURSOR_1049: u16 = 1049;
pub const MOUSE_PRESS: u16 = 1000;
pub const MOUSE_PRESS_RELEASE: u16 = 1002;
pub const MOUSE_ANY_MOTION: u16 = 1003;
pub const MOUSE_SGR_ENCODING: u16 = 1006;
pub const BRACKETED_PASTE: u16 = 2004;

// OSC command codes.
pub const OSC_TITLE_AND_ICON: &[u8] = b"0";
pub const OSC_ICON_NAME: &[u8] = b"1";
pub const OSC_TITLE: &[u8] = b"2";
