mod common;

use common::*;
use sdspi::bus::SdSpi;
use sdspi::{BlockDevice, DiskError};

#[test]
fn sync_selects_waits_and_deselects() {
    let mut sd = new_card();
    init_sdhc(&mut sd);
    sd.spi_mut().queue_bytes(&[0x00, 0xFF]);

    assert_eq!(sd.sync(), Ok(()));

    // Exactly one select/deselect pair: the priming exchange, one busy
    // poll, and the trailing byte after deselect.
    let spi = sd.spi();
    let tail: Vec<Setting> = spi
        .settings
        .iter()
        .rev()
        .take(2)
        .rev()
        .copied()
        .collect();
    assert!(matches!(tail[0], Setting::ChipSelect { high: false, .. }));
    assert!(matches!(tail[1], Setting::ChipSelect { high: true, .. }));
    assert!(sd.is_error_log_empty());
}

#[test]
fn sync_is_idempotent_with_bounded_traffic() {
    let mut sd = new_card();
    init_sdhc(&mut sd);
    sd.spi_mut().reset_byte_count();

    sd.spi_mut().queue_bytes(&[0x00, 0xFF]);
    assert_eq!(sd.sync(), Ok(()));
    let first = sd.spi().byte_count();

    sd.spi_mut().queue_bytes(&[0x00, 0xFF]);
    assert_eq!(sd.sync(), Ok(()));

    // The second sync costs exactly one more select/deselect pair.
    assert_eq!(sd.spi().byte_count(), first * 2);
}

#[test]
fn sync_times_out_when_the_card_stays_busy() {
    let mut sd = new_card();
    init_sdhc(&mut sd);
    // A busy card holds the data line low forever.
    sd.spi_mut().empty_response = 0x00;

    assert_eq!(sd.sync(), Err(DiskError::Io));

    let log = log_contents(&sd);
    assert!(log.contains("wait_while_busy(500) - Time out"));
    assert!(log.contains("select() - 500 msec time out"));
    assert!(log.contains("sync() - Failed waiting for not busy"));
    assert_eq!(sd.diagnostics().maximum_wait_while_busy_ms, 500);
}
