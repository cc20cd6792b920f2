use crate::error::{Frame, TplError};
use crate::runtime::RenderError;
use crate::sourcemap::SourceMap;

/// 把生成代码内的运行期失败改写回模板源位置。
///
/// 出错的生成行经源码映射解析为 (路径, 行) 链——
/// 引入/继承每拼接一层，链就多一跳。为每一跳合成一个
/// 伪造的 render 栈帧，对外的调用栈读起来就像模板文件
/// 在直接互相调用；链到达被渲染的根模板即截断，
/// 不再下探到无关的共享局部。
///
/// 映射是尽力而为：没有源码映射（编译期失败早于映射生成）
/// 时错误原样传递。
pub fn map_render_error(
    error: RenderError,
    source_map: Option<&SourceMap>,
    root_path: &str,
) -> TplError {
    let Some(map) = source_map else {
        return TplError::render(error.message, error.line);
    };

    let mut frames = Vec::new();
    if let Some(chain) = map.chain_for_line(error.line) {
        for location in chain {
            frames.push(Frame {
                path: location.path.clone(),
                line: location.line,
            });
            if location.path == root_path {
                break;
            }
        }
    }

    TplError::Render {
        message: error.message,
        generated_line: error.line,
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::{SourceLocation, SourceMapEntry};

    fn map_with_chain(chain: Vec<(&str, usize)>) -> SourceMap {
        SourceMap {
            entries: vec![SourceMapEntry {
                generated_line: 3,
                chain: chain
                    .into_iter()
                    .map(|(path, line)| SourceLocation {
                        path: path.to_string(),
                        line,
                    })
                    .collect(),
            }],
            paths: Vec::new(),
        }
    }

    #[test]
    fn chain_becomes_frames_outermost_root() {
        let map = map_with_chain(vec![("c", 1), ("b", 2), ("a", 5)]);
        let err = map_render_error(RenderError::new("boom", 3), Some(&map), "a");
        let TplError::Render { frames, .. } = &err else {
            panic!()
        };
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].path, "c");
        assert_eq!(frames[2].path, "a");
        // 展示时最外层是根模板
        assert!(err.to_string().contains("a:5"));
    }

    #[test]
    fn chain_truncated_at_root() {
        let map = map_with_chain(vec![("c", 1), ("a", 5), ("shared", 9)]);
        let err = map_render_error(RenderError::new("boom", 3), Some(&map), "a");
        let TplError::Render { frames, .. } = err else {
            panic!()
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.last().unwrap().path, "a");
    }

    #[test]
    fn no_map_passes_through() {
        let err = map_render_error(RenderError::new("boom", 7), None, "a");
        let TplError::Render {
            frames,
            generated_line,
            ..
        } = err
        else {
            panic!()
        };
        assert!(frames.is_empty());
        assert_eq!(generated_line, 7);
    }
}
