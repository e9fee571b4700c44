use crate::defaults::{INITIAL_CONGESTION_WINDOW, TCP_SEGMENT_SIZE};

/// Progress of a download over a [`TcpConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Download {
    pub round_trips: u32,
    /// milliseconds
    pub time_elapsed: f64,
    pub bytes_downloaded: f64,
    /// bytes an H2 connection pulled past the end of the response, they
    /// count toward the next response on the connection
    pub extra_bytes_downloaded: f64,
    /// congestion window at the end of the download, in segments
    pub congestion_window: f64,
}

/// Bounds of a [`TcpConnection::simulate_download_until`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadLimits {
    /// time the request has already spent on the connection, milliseconds
    pub time_already_elapsed: f64,
    /// stop once this much time (milliseconds) has elapsed
    pub maximum_time_to_elapse: f64,
    /// time left until the host name is resolved, milliseconds
    pub dns_resolution_time: f64,
}

impl Default for DownloadLimits {
    fn default() -> Self {
        Self {
            time_already_elapsed: 0.0,
            maximum_time_to_elapse: f64::INFINITY,
            dns_resolution_time: 0.0,
        }
    }
}

/// The slow start model of one TCP connection.
///
/// A cold connection pays the TCP handshake (and a TLS round trip on
/// secure origins) before the request goes out. The server answers after
/// its response time; from there the congestion window doubles every
/// round trip until it reaches what the throughput allows in one round
/// trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpConnection {
    /// milliseconds
    rtt: f64,
    /// bits per second
    throughput: f64,
    /// milliseconds
    server_response_time: f64,
    tls: bool,
    h2: bool,
    warm: bool,
    congestion_window: f64,
    h2_overflow_bytes: f64,
}

impl TcpConnection {
    pub fn new(rtt: f64, throughput: f64, server_response_time: f64, tls: bool, h2: bool) -> Self {
        Self {
            rtt,
            throughput,
            server_response_time,
            tls,
            h2,
            warm: false,
            congestion_window: INITIAL_CONGESTION_WINDOW,
            h2_overflow_bytes: 0.0,
        }
    }

    fn maximum_congestion_window(&self) -> f64 {
        let bytes_per_second = self.throughput / 8.0;
        let bytes_per_round_trip = bytes_per_second * self.rtt / 1_000.0;
        (bytes_per_round_trip / TCP_SEGMENT_SIZE).floor()
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.warm
    }

    #[inline]
    pub fn is_h2(&self) -> bool {
        self.h2
    }

    #[inline]
    pub fn congestion_window(&self) -> f64 {
        self.congestion_window
    }

    pub fn set_warm(&mut self, warm: bool) {
        self.warm = warm;
    }

    pub fn set_throughput(&mut self, throughput: f64) {
        self.throughput = throughput;
    }

    pub fn set_congestion_window(&mut self, congestion_window: f64) {
        self.congestion_window = congestion_window;
    }

    pub fn set_h2_overflow_bytes(&mut self, bytes: f64) {
        if self.h2 {
            self.h2_overflow_bytes = bytes;
        }
    }

    /// Forget everything the connection learned: next request pays the
    /// handshake and slow start again.
    pub fn reset(&mut self) {
        self.warm = false;
        self.congestion_window = INITIAL_CONGESTION_WINDOW;
        self.h2_overflow_bytes = 0.0;
    }

    /// Download `bytes` (or as much of them as `limits` allow).
    ///
    /// The connection itself is not modified, callers apply the returned
    /// congestion window once the time period is over.
    pub fn simulate_download_until(&self, bytes: f64, limits: DownloadLimits) -> Download {
        let mut bytes_to_download = bytes;
        if self.warm && self.h2 {
            bytes_to_download -= self.h2_overflow_bytes;
        }

        let two_way_latency = self.rtt;
        let one_way_latency = two_way_latency / 2.0;
        let maximum_congestion_window = self.maximum_congestion_window();

        let handshake_and_request = if self.warm {
            one_way_latency
        } else {
            // DNS, SYN, SYN ACK, ACK + request, then TLS with false start
            let tls = if self.tls { two_way_latency } else { 0.0 };
            limits.dns_resolution_time + one_way_latency * 3.0 + tls
        };

        let mut round_trips = (handshake_and_request / two_way_latency).ceil() as u32;
        let time_to_first_byte = if self.warm && self.h2 {
            0.0
        } else {
            handshake_and_request + self.server_response_time + one_way_latency
        };

        let time_elapsed_for_ttfb = (time_to_first_byte - limits.time_already_elapsed).max(0.0);
        let maximum_download_time = limits.maximum_time_to_elapse - time_elapsed_for_ttfb;

        let mut congestion_window = self.congestion_window.min(maximum_congestion_window);
        let mut total_bytes_downloaded = 0.0;
        if time_elapsed_for_ttfb > 0.0 {
            total_bytes_downloaded = congestion_window * TCP_SEGMENT_SIZE;
        } else {
            round_trips = 0;
        }

        let mut download_time_elapsed = 0.0;
        let mut bytes_remaining = bytes_to_download - total_bytes_downloaded;
        while bytes_remaining > 0.0 && download_time_elapsed <= maximum_download_time {
            round_trips += 1;
            download_time_elapsed += two_way_latency;
            congestion_window = (congestion_window * 2.0).min(maximum_congestion_window).max(1.0);
            let window_bytes = congestion_window * TCP_SEGMENT_SIZE;
            total_bytes_downloaded += window_bytes;
            bytes_remaining -= window_bytes;
        }

        let extra_bytes_downloaded = if self.h2 {
            (total_bytes_downloaded - bytes_to_download).max(0.0)
        } else {
            0.0
        };

        Download {
            round_trips,
            time_elapsed: time_elapsed_for_ttfb + download_time_elapsed,
            bytes_downloaded: total_bytes_downloaded.min(bytes_to_download).max(0.0),
            extra_bytes_downloaded,
            congestion_window,
        }
    }
}
