mod cpu_slowdown;
mod latency;
mod throttling;
mod throughput;

pub use self::{
    cpu_slowdown::{CpuSlowdown, CpuSlowdownError, CpuSlowdownParseError},
    latency::Latency,
    throttling::ThrottlingProfile,
    throughput::Throughput,
};
