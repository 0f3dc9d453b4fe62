// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Execution device selection for the ONNX sessions.
use std::fmt;
use std::str::FromStr;

/// Hardware device both models run on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Device {
    /// Plain ONNX Runtime CPU provider.
    #[default]
    Cpu,
    /// NVIDIA GPU through CUDA, with device index.
    Cuda(usize),
    /// NVIDIA GPU through `TensorRT`, with device index.
    TensorRt(usize),
    /// Apple `CoreML`.
    CoreMl,
    /// Intel `OpenVINO`.
    OpenVino,
    /// `DirectML` on Windows, with device index.
    DirectMl(usize),
    /// AMD GPU through `ROCm`, with device index.
    Rocm(usize),
    /// XNNPACK CPU kernels.
    Xnnpack,
}

impl Device {
    /// Name of the ONNX Runtime execution provider used for this device.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self {
            Self::Cpu => "CPUExecutionProvider",
            Self::Cuda(_) => "CUDAExecutionProvider",
            Self::TensorRt(_) => "TensorrtExecutionProvider",
            Self::CoreMl => "CoreMLExecutionProvider",
            Self::OpenVino => "OpenVINOExecutionProvider",
            Self::DirectMl(_) => "DmlExecutionProvider",
            Self::Rocm(_) => "ROCMExecutionProvider",
            Self::Xnnpack => "XnnpackExecutionProvider",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::TensorRt(i) => write!(f, "tensorrt:{i}"),
            Self::CoreMl => write!(f, "coreml"),
            Self::OpenVino => write!(f, "openvino"),
            Self::DirectMl(i) => write!(f, "directml:{i}"),
            Self::Rocm(i) => write!(f, "rocm:{i}"),
            Self::Xnnpack => write!(f, "xnnpack"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => return Ok(Self::Cpu),
            "coreml" | "mps" => return Ok(Self::CoreMl),
            "openvino" => return Ok(Self::OpenVino),
            "xnnpack" => return Ok(Self::Xnnpack),
            _ => {}
        }

        let indexed: [(&str, fn(usize) -> Self); 4] = [
            ("cuda", Self::Cuda),
            ("tensorrt", Self::TensorRt),
            ("directml", Self::DirectMl),
            ("rocm", Self::Rocm),
        ];
        for (prefix, make) in indexed {
            if let Some(rest) = s.strip_prefix(prefix) {
                return parse_device_index(rest)
                    .map(make)
                    .ok_or_else(|| format!("Invalid device index in '{s}'"));
            }
        }
        Err(format!("Unknown device: {s}"))
    }
}

/// Parse the optional `:N` suffix; a missing suffix means device 0.
fn parse_device_index(s: &str) -> Option<usize> {
    if s.is_empty() {
        return Some(0);
    }
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("CUDA").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Cuda(1));
        assert_eq!(Device::from_str("tensorrt:0").unwrap(), Device::TensorRt(0));
        assert_eq!(Device::from_str("mps").unwrap(), Device::CoreMl);
        assert_eq!(Device::from_str("directml:2").unwrap(), Device::DirectMl(2));
        assert_eq!(Device::from_str("rocm").unwrap(), Device::Rocm(0));
    }

    #[test]
    fn test_parse_device_errors() {
        assert!(Device::from_str("tpu").is_err());
        assert!(Device::from_str("cuda:x").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for device in [Device::Cpu, Device::Cuda(3), Device::OpenVino] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }
}
