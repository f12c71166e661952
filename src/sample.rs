//! Sample formats and block geometry

use std::{fmt, mem::size_of, str::FromStr};

use num_complex::Complex;

use crate::error::{Error, Result};

/// Host-side sample type. Every sample is complex, so the width is two components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    Short,
    Float,
    Double,
}

impl SampleType {
    /// Bytes per complex sample
    pub fn size(&self) -> usize {
        match self {
            SampleType::Short => size_of::<Complex<i16>>(),
            SampleType::Float => size_of::<Complex<f32>>(),
            SampleType::Double => size_of::<Complex<f64>>(),
        }
    }

    /// Streamer CPU format name
    pub fn cpu_format(&self) -> &'static str {
        match self {
            SampleType::Short => "sc16",
            SampleType::Float => "fc32",
            SampleType::Double => "fc64",
        }
    }

    /// GNU Radio file-metadata item type code
    pub fn item_type(&self) -> u8 {
        match self {
            SampleType::Short => 1,
            SampleType::Float => 5,
            SampleType::Double => 6,
        }
    }
}

impl FromStr for SampleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short" => Ok(SampleType::Short),
            "float" => Ok(SampleType::Float),
            "double" => Ok(SampleType::Double),
            _ => Err(Error::UnknownSampleType(s.to_owned())),
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::Short => "short",
            SampleType::Float => "float",
            SampleType::Double => "double",
        };
        f.write_str(name)
    }
}

/// Over-the-wire format between radio and host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    Sc8,
    Sc16,
}

impl WireFormat {
    pub fn name(&self) -> &'static str {
        match self {
            WireFormat::Sc8 => "sc8",
            WireFormat::Sc16 => "sc16",
        }
    }
}

impl FromStr for WireFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sc8" => Ok(WireFormat::Sc8),
            "sc16" => Ok(WireFormat::Sc16),
            _ => Err(Error::UnknownWireFormat(s.to_owned())),
        }
    }
}

/// A chunk of raw sample bytes moved through the ring as one unit.
/// Holds at most one element's worth of bytes, and always a whole number of samples.
pub type Block = Vec<u8>;

/// How many samples fit in one ring element. Fails if the element would hold a fractional sample.
pub fn samples_per_element(element_size: usize, sample_type: SampleType) -> Result<usize> {
    let sample = sample_type.size();
    if element_size == 0 || element_size % sample != 0 {
        return Err(Error::ElementSize {
            element: element_size,
            sample,
        });
    }
    Ok(element_size / sample)
}
