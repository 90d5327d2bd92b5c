#![allow(non_snake_case)]
use tock_registers::{
    register_bitfields,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

/// Cadence UART (`uart_ps`) register block
#[repr(C)]
pub struct UartRegs {
    /// Control register
    pub CR: ReadWrite<u32, CR::Register>,
    /// Mode register
    pub MR: ReadWrite<u32, MR::Register>,
    /// Interrupt enable register
    pub IER: WriteOnly<u32>,
    /// Interrupt disable register
    pub IDR: WriteOnly<u32>,
    /// Interrupt mask register
    pub IMR: ReadOnly<u32>,
    /// Channel interrupt status register
    pub ISR: ReadWrite<u32>,
    /// Baud rate generator register
    pub BAUDGEN: ReadWrite<u32, BAUDGEN::Register>,
    /// Receiver timeout register
    pub RXTOUT: ReadWrite<u32>,
    /// Receiver FIFO trigger level register
    pub RXWM: ReadWrite<u32>,
    /// Modem control register
    pub MODEMCR: ReadWrite<u32>,
    /// Modem status register
    pub MODEMSR: ReadWrite<u32>,
    /// Channel status register
    pub SR: ReadOnly<u32, SR::Register>,
    /// Transmit and receive FIFO
    pub FIFO: ReadWrite<u32>,
    /// Baud rate divider register
    pub BAUDDIV: ReadWrite<u32, BAUDDIV::Register>,
    /// Flow control delay register
    pub FLOWDEL: ReadWrite<u32>,
    _reserved0: [u32; 2],
    /// Transmitter FIFO trigger level register
    pub TXWM: ReadWrite<u32>,
}

register_bitfields! {u32,
    pub CR [
        /// Stop transmitter break
        STOPBRK OFFSET(8) NUMBITS(1) [],
        /// Start transmitter break
        STARTBRK OFFSET(7) NUMBITS(1) [],
        /// Restart receiver timeout counter
        TORST OFFSET(6) NUMBITS(1) [],
        /// Transmit disable
        TX_DIS OFFSET(5) NUMBITS(1) [],
        /// Transmit enable
        TX_EN OFFSET(4) NUMBITS(1) [],
        /// Receive disable
        RX_DIS OFFSET(3) NUMBITS(1) [],
        /// Receive enable
        RX_EN OFFSET(2) NUMBITS(1) [],
        /// Software reset for the transmit data path. Self-clearing.
        TXRST OFFSET(1) NUMBITS(1) [],
        /// Software reset for the receive data path. Self-clearing.
        RXRST OFFSET(0) NUMBITS(1) []
    ],

    pub MR [
        /// Channel mode
        CHMODE OFFSET(8) NUMBITS(2) [
            Normal = 0b00,
            AutomaticEcho = 0b01,
            LocalLoopback = 0b10,
            RemoteLoopback = 0b11
        ],
        /// Number of stop bits
        NBSTOP OFFSET(6) NUMBITS(2) [
            One = 0b00,
            OneAndHalf = 0b01,
            Two = 0b10
        ],
        /// Parity type
        PAR OFFSET(3) NUMBITS(3) [
            Even = 0b000,
            Odd = 0b001,
            Space = 0b010,
            Mark = 0b011,
            NoParity = 0b100
        ],
        /// Character length
        CHRL OFFSET(1) NUMBITS(2) [
            EightBits = 0b00,
            SevenBits = 0b10,
            SixBits = 0b11
        ],
        /// Clock source select. `0` selects the reference clock undivided.
        CLKS OFFSET(0) NUMBITS(1) []
    ],

    pub BAUDGEN [
        /// Baud rate clock divisor
        CD OFFSET(0) NUMBITS(16) []
    ],

    pub BAUDDIV [
        /// Baud rate divider
        BDIV OFFSET(0) NUMBITS(8) []
    ],

    pub SR [
        /// Transmitter FIFO nearly full
        TNFUL OFFSET(14) NUMBITS(1) [],
        /// Transmitter state machine active
        TACTIVE OFFSET(11) NUMBITS(1) [],
        /// Receiver state machine active
        RACTIVE OFFSET(10) NUMBITS(1) [],
        /// Transmitter FIFO full
        TXFULL OFFSET(4) NUMBITS(1) [],
        /// Transmitter FIFO empty
        TXEMPTY OFFSET(3) NUMBITS(1) [],
        /// Receiver FIFO full
        RXFULL OFFSET(2) NUMBITS(1) [],
        /// Receiver FIFO empty
        RXEMPTY OFFSET(1) NUMBITS(1) []
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;

    #[test]
    fn register_offsets() {
        assert_eq!(offset_of!(UartRegs, CR), 0x00);
        assert_eq!(offset_of!(UartRegs, MR), 0x04);
        assert_eq!(offset_of!(UartRegs, BAUDGEN), 0x18);
        assert_eq!(offset_of!(UartRegs, SR), 0x2c);
        assert_eq!(offset_of!(UartRegs, FIFO), 0x30);
        assert_eq!(offset_of!(UartRegs, BAUDDIV), 0x34);
        assert_eq!(offset_of!(UartRegs, TXWM), 0x44);
    }
}
