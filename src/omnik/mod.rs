pub mod information;    // Information reply payload layout
pub mod inverter;       // Request/response exchange with one inverter
pub mod packet;         // Frame encoding and decoding
pub mod packet_decoder; // Frames out of a byte stream
